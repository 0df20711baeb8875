//! External synthesizer (fluidsynth) integration.
//!
//! fluidsynth is optional: when it cannot be found every entry point returns
//! [`FontshelfError::SynthUnavailable`](crate::FontshelfError::SynthUnavailable)
//! and callers carry on without audio.

mod locate;
mod runner;

pub use locate::{detect_audio_driver, locate_fluidsynth};
pub use runner::{PlayOptions, SynthRunner};
