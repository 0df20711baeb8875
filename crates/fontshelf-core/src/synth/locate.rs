//! Finding the fluidsynth executable and a usable audio driver.

use crate::config::SynthConfig;
use crate::error::{FontshelfError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Locate fluidsynth.
///
/// Order: `explicit` (when it exists), every directory on `PATH`, then the
/// well-known install locations for this OS.
pub fn locate_fluidsynth(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            debug!("Using configured fluidsynth at {}", path.display());
            return Ok(path.to_path_buf());
        }
        warn!(
            "Configured fluidsynth path {} does not exist, searching instead",
            path.display()
        );
    }

    if let Some(path) = search_path(SynthConfig::EXECUTABLE_NAMES) {
        debug!("Found fluidsynth on PATH at {}", path.display());
        return Ok(path);
    }

    if let Some(path) = SynthConfig::common_locations()
        .into_iter()
        .find(|p| p.is_file())
    {
        debug!("Found fluidsynth at {}", path.display());
        return Ok(path);
    }

    Err(FontshelfError::SynthUnavailable {
        message: "fluidsynth not found on PATH or in common install locations".into(),
    })
}

/// First `names` entry found in a `PATH` directory.
fn search_path(names: &[&str]) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Pick the fluidsynth audio driver for this machine.
pub fn detect_audio_driver() -> &'static str {
    if cfg!(target_os = "macos") {
        "coreaudio"
    } else if cfg!(windows) {
        "dsound"
    } else if command_succeeds("pulseaudio", &["--check"]) || command_succeeds("pidof", &["pipewire"]) {
        "pulseaudio"
    } else {
        "alsa"
    }
}

fn command_succeeds(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
