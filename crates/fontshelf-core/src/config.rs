//! Centralized configuration for Fontshelf.
//!
//! Compile-time constants live on unit structs; user-adjustable values live in
//! [`Settings`], which is read from an optional JSON file and then overridden
//! by command-line flags.

use crate::analysis::QualityThresholds;
use crate::catalog::SimilarityWeights;
use crate::error::{FontshelfError, Result};
use crate::extract::ExtractorKind;
use crate::persistence::read_json_file;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Catalog document configuration.
pub struct CatalogConfig;

impl CatalogConfig {
    pub const DOCUMENT_VERSION: u32 = 1;
    pub const DEFAULT_CATALOG_FILE: &'static str = "soundfonts.json";
    /// Separator for set-valued fields in CSV rows.
    pub const LIST_DELIMITER: char = ',';
    pub const KEEP_BACKUP: bool = true;
    pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
}

/// Directory scan configuration.
pub struct ScanConfig;

impl ScanConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const SOUNDFONT_EXTENSION: &'static str = "sf2";
}

/// External synthesizer configuration.
pub struct SynthConfig;

impl SynthConfig {
    #[cfg(windows)]
    pub const EXECUTABLE_NAMES: &'static [&'static str] = &["fluidsynth.exe", "fluidsynth"];
    #[cfg(not(windows))]
    pub const EXECUTABLE_NAMES: &'static [&'static str] = &["fluidsynth"];

    pub const DEFAULT_GAIN: f32 = 1.0;
    pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

    // Subprocess timeouts
    pub const PLAY_TIMEOUT: Duration = Duration::from_secs(120);
    pub const RENDER_TIMEOUT: Duration = Duration::from_secs(300);
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
    pub const TERMINATE_GRACE: Duration = Duration::from_secs(1);

    /// Well-known install locations checked after `PATH`.
    pub fn common_locations() -> Vec<PathBuf> {
        if cfg!(windows) {
            let program_files = std::env::var("PROGRAMFILES")
                .unwrap_or_else(|_| "C:\\Program Files".to_string());
            let program_files_x86 = std::env::var("PROGRAMFILES(X86)")
                .unwrap_or_else(|_| "C:\\Program Files (x86)".to_string());
            vec![
                Path::new(&program_files).join("FluidSynth").join("fluidsynth.exe"),
                Path::new(&program_files_x86).join("FluidSynth").join("fluidsynth.exe"),
                Path::new(&program_files).join("fluidsynth.exe"),
                Path::new(&program_files_x86).join("fluidsynth.exe"),
            ]
        } else if cfg!(target_os = "macos") {
            vec![
                PathBuf::from("/usr/local/bin/fluidsynth"),
                PathBuf::from("/opt/homebrew/bin/fluidsynth"),
                PathBuf::from("/usr/bin/fluidsynth"),
            ]
        } else {
            vec![
                PathBuf::from("/usr/bin/fluidsynth"),
                PathBuf::from("/usr/local/bin/fluidsynth"),
                PathBuf::from("/opt/bin/fluidsynth"),
            ]
        }
    }
}

/// Offline rendering and spectral analysis parameters.
pub struct AnalysisConfig;

impl AnalysisConfig {
    pub const RENDER_SAMPLE_RATE: i32 = 22_050;
    pub const FRAME_SIZE: usize = 2048;
    pub const HOP_SIZE: usize = 512;
    pub const TEST_NOTE_SECONDS: f32 = 0.5;
    pub const TEST_VELOCITY: i32 = 100;
    /// RMS below which a rendered buffer counts as silent.
    pub const SILENCE_RMS: f32 = 1e-4;
    pub const PROBE_NOTE_SECONDS: f32 = 0.12;

    pub const BRIGHTNESS_THRESHOLDS: [f32; 3] = [500.0, 1500.0, 3000.0];
    pub const RICHNESS_THRESHOLDS: [f32; 3] = [500.0, 1500.0, 3000.0];
    /// Applied to the zero-crossing rate scaled by 10 000.
    pub const ATTACK_THRESHOLDS: [f32; 3] = [50.0, 150.0, 300.0];
    pub const HARMONIC_THRESHOLDS: [f32; 3] = [0.5, 2.0, 5.0];
}

/// Shared directory and path configurations.
pub struct PathsConfig;

impl PathsConfig {
    pub const APP_DIR_NAME: &'static str = "fontshelf";
    pub const SETTINGS_FILE_NAME: &'static str = "settings.json";

    /// `~/.config/fontshelf/settings.json` (or the platform equivalent).
    pub fn default_settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(Self::APP_DIR_NAME)
                .join(Self::SETTINGS_FILE_NAME)
        })
    }
}

/// User-adjustable settings, loaded from JSON.
///
/// Every field has a default so a partial (or absent) file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub similarity: SimilarityWeights,
    pub quality: QualityThresholds,
    pub extractor: ExtractorKind,
    pub fluidsynth_path: Option<PathBuf>,
    pub audio_driver: Option<String>,
    pub gain: f32,
    pub sample_rate: u32,
    pub synth_timeout_secs: u64,
    pub batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            similarity: SimilarityWeights::default(),
            quality: QualityThresholds::default(),
            extractor: ExtractorKind::default(),
            fluidsynth_path: None,
            audio_driver: None,
            gain: SynthConfig::DEFAULT_GAIN,
            sample_rate: SynthConfig::DEFAULT_SAMPLE_RATE,
            synth_timeout_secs: SynthConfig::PLAY_TIMEOUT.as_secs(),
            batch_size: ScanConfig::DEFAULT_BATCH_SIZE,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults if the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = match read_json_file::<Settings>(path)? {
            Some(settings) => {
                debug!("Loaded settings from {}", path.display());
                settings
            }
            None => Settings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load from the platform config directory, or defaults.
    pub fn load_default() -> Result<Self> {
        match PathsConfig::default_settings_path() {
            Some(path) => Self::load(&path),
            None => Ok(Settings::default()),
        }
    }

    pub fn synth_timeout(&self) -> Duration {
        Duration::from_secs(self.synth_timeout_secs)
    }

    /// Reject values that would make later operations meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(FontshelfError::Config {
                message: "batch_size must be at least 1".into(),
            });
        }
        if !(self.gain.is_finite() && self.gain >= 0.0) {
            return Err(FontshelfError::Config {
                message: format!("gain must be a non-negative number, got {}", self.gain),
            });
        }
        if self.sample_rate == 0 {
            return Err(FontshelfError::Config {
                message: "sample_rate must be positive".into(),
            });
        }
        self.similarity.validate()?;
        self.quality.validate()?;
        Ok(())
    }
}
