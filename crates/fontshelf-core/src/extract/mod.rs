//! Metadata extraction.
//!
//! An extractor never fails outright: whatever it could learn about a file is
//! returned in an [`Extraction`], with problems listed as warnings. Which
//! extractor runs is decided once at startup through [`ExtractorKind`].

mod file_stat;
mod hashing;
mod sf2;

pub use file_stat::FileStatExtractor;
pub use hashing::compute_sha256;
pub use sf2::Sf2Extractor;

use crate::error::FontshelfError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Knobs for a single extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Render every key and treat silent ones as missing (slow).
    pub probe_note_range: bool,
    pub compute_hash: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            probe_note_range: false,
            compute_hash: true,
        }
    }
}

/// Facts available for any file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileFacts {
    pub file_name: String,
    pub file_size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub hash: Option<String>,
}

/// Facts read from the SF2 structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sf2Facts {
    pub bank_name: String,
    pub author: String,
    pub copyright: String,
    pub comments: String,
    pub preset_names: Vec<String>,
    pub instrument_names: Vec<String>,
    pub sample_count: usize,
    /// Highest sample rate among the samples.
    pub sample_rate: Option<u32>,
    pub bit_depth: u16,
    /// Keys the file maps (or, when `probed`, keys that actually sound).
    pub covered_keys: BTreeSet<u8>,
    pub original_pitches: BTreeSet<u8>,
    pub probed: bool,
}

/// Result of running an extractor over one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub path: PathBuf,
    pub file: FileFacts,
    /// `None` when the file could not be parsed as SF2.
    pub sf2: Option<Sf2Facts>,
    pub warnings: Vec<String>,
}

impl Extraction {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: FileFacts::default(),
            sf2: None,
            warnings: Vec::new(),
        }
    }

    /// Record and log a non-fatal problem.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}: {}", self.path.display(), message);
        self.warnings.push(message);
    }

    pub fn is_complete(&self) -> bool {
        self.sf2.is_some() && self.warnings.is_empty()
    }
}

/// Pluggable metadata source.
pub trait MetadataExtractor: Send + Sync {
    /// Short identifier used in logs and settings.
    fn name(&self) -> &'static str;

    /// Extract what can be learned about `path`. Never fails; problems are
    /// reported through [`Extraction::warnings`].
    fn extract(&self, path: &Path, options: &ExtractOptions) -> Extraction;
}

/// Which extractor to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorKind {
    #[default]
    Sf2,
    FileStat,
}

impl ExtractorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractorKind::Sf2 => "sf2",
            ExtractorKind::FileStat => "file-stat",
        }
    }

    pub fn build(&self) -> Box<dyn MetadataExtractor> {
        match self {
            ExtractorKind::Sf2 => Box::new(Sf2Extractor),
            ExtractorKind::FileStat => Box::new(FileStatExtractor),
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractorKind {
    type Err = FontshelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "sf2" => Ok(ExtractorKind::Sf2),
            "file-stat" | "stat" => Ok(ExtractorKind::FileStat),
            other => Err(FontshelfError::validation(
                "extractor",
                format!("unknown extractor '{other}', expected sf2 or file-stat"),
            )),
        }
    }
}
