//! Fontshelf CLI - the `sf-annotate` and `sf-compose` front-ends.
//!
//! Both binaries are thin: they parse arguments, install logging and the
//! interrupt handler from this crate, and hand off to [`annotate::run`] or
//! [`compose::run`].

pub mod annotate;
pub mod compose;
mod prompt;

use anyhow::{Context, Result};
use fontshelf_core::{CancellationToken, Settings};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing::{warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub use annotate::AnnotateArgs;
pub use compose::ComposeArgs;
pub use prompt::{Audition, PromptReviewer};

/// Exit status used when a second interrupt aborts the process.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Install the global subscriber. `RUST_LOG` takes precedence over `debug`.
pub fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Route Ctrl-C into `cancel`.
///
/// The first interrupt asks running work to stop at the next check; a second
/// one exits immediately.
pub fn install_interrupt_handler(cancel: &CancellationToken) -> Result<()> {
    let token = cancel.clone();
    ctrlc::set_handler(move || {
        if token.cancel() > 1 {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        warn!("Interrupt received, stopping after the current step (Ctrl-C again to quit)");
    })
    .context("Failed to install Ctrl-C handler")
}

/// Settings from `path`, or from the platform default location.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Settings::load_default().context("Failed to load default settings"),
    }
}
