//! Simple MIDI composition for auditioning soundfonts.
//!
//! A [`CompositionRequest`] picks a key, scale, tempo and [`Style`]; the
//! generator fills in chords, melody, bass and drums, and [`write_midi`]
//! encodes the result as a standard MIDI file.

mod generator;
mod midi;
mod theory;

pub use generator::{
    generate, ChordEvent, Composition, CompositionRequest, NoteEvent, Part, PartRole, DRUM_CHANNEL,
    MAX_TEMPO, MIN_TEMPO,
};
pub use midi::{encode_midi, write_midi, write_test_midi, TICKS_PER_QUARTER};
pub use theory::{
    degree_offset, BassPattern, ChordType, DrumPattern, Programs, Progression, ScaleType, Style,
    CLOSED_HAT, KICK, OPEN_HAT, SNARE,
};
