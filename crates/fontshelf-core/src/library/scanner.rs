//! Directory scanning: discover soundfonts, extract, analyze and catalog them.

use crate::analysis::{analyze_soundfont, record_from_extraction, QualityThresholds};
use crate::cancel::CancellationToken;
use crate::catalog::{CatalogIndex, SoundfontRecord, Timbre};
use crate::config::ScanConfig;
use crate::error::{FontshelfError, Result};
use crate::extract::{compute_sha256, ExtractOptions, Extraction, ExtractorKind, MetadataExtractor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// How much work each file gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Extraction and suggestions only.
    Basic,
    /// Adds timbre analysis.
    #[default]
    Full,
    /// Full, plus a reviewer that can edit each record.
    Interactive,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Basic => "basic",
            ScanMode::Full => "full",
            ScanMode::Interactive => "interactive",
        }
    }

    pub fn analyzes_timbre(&self) -> bool {
        !matches!(self, ScanMode::Basic)
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = FontshelfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(ScanMode::Basic),
            "full" => Ok(ScanMode::Full),
            "interactive" => Ok(ScanMode::Interactive),
            other => Err(FontshelfError::validation(
                "mode",
                format!("unknown scan mode '{other}', expected basic, full or interactive"),
            )),
        }
    }
}

/// Options for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub directory: PathBuf,
    pub recursive: bool,
    /// Re-process files already in the catalog even if unchanged.
    pub force: bool,
    pub mode: ScanMode,
    /// Skip timbre analysis regardless of mode.
    pub skip_timbre: bool,
    /// Processed files between `on_batch` calls.
    pub batch_size: usize,
    pub extract: ExtractOptions,
    pub thresholds: QualityThresholds,
}

impl ScanOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            recursive: false,
            force: false,
            mode: ScanMode::default(),
            skip_timbre: false,
            batch_size: ScanConfig::DEFAULT_BATCH_SIZE,
            extract: ExtractOptions::default(),
            thresholds: QualityThresholds::default(),
        }
    }

    pub fn analyze_timbre(&self) -> bool {
        self.mode.analyzes_timbre() && !self.skip_timbre
    }
}

/// Where a scan is.
#[derive(Debug, Clone, Copy)]
pub struct ScanProgress<'a> {
    /// 1-based position of `path` among the discovered files.
    pub position: usize,
    pub total: usize,
    pub path: &'a Path,
}

/// Receives progress and periodic save requests during a scan.
pub trait ScanObserver {
    fn on_file(&mut self, _progress: &ScanProgress<'_>) {}

    /// Called every `batch_size` processed files so the caller can persist
    /// partial work. An error aborts the scan.
    fn on_batch(&mut self, _catalog: &CatalogIndex) -> Result<()> {
        Ok(())
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Manual review of each record in interactive mode.
pub trait RecordReviewer {
    /// Return the (possibly edited) record to insert, or `None` to leave the
    /// file out of the catalog. [`FontshelfError::Cancelled`] stops the scan.
    fn review(&mut self, record: SoundfontRecord, extraction: &Extraction) -> Result<Option<SoundfontRecord>>;
}

impl<T: RecordReviewer + ?Sized> RecordReviewer for &mut T {
    fn review(&mut self, record: SoundfontRecord, extraction: &Extraction) -> Result<Option<SoundfontRecord>> {
        (**self).review(record, extraction)
    }
}

/// Outcome of a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub discovered: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn processed(&self) -> usize {
        self.added + self.updated
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} found, {} added, {} updated, {} skipped, {} failed",
            self.discovered,
            self.added,
            self.updated,
            self.skipped,
            self.failed.len()
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

type TimbreAnalyzer = dyn Fn(&Path) -> Result<Timbre> + Send + Sync;

enum Outcome {
    Added,
    Updated,
    Skipped,
}

/// Walks a directory and brings its soundfonts into a catalog.
pub struct LibraryScanner<'a> {
    extractor: Box<dyn MetadataExtractor>,
    timbre: Box<TimbreAnalyzer>,
    reviewer: Option<Box<dyn RecordReviewer + 'a>>,
}

impl<'a> LibraryScanner<'a> {
    pub fn new(extractor: Box<dyn MetadataExtractor>) -> Self {
        Self {
            extractor,
            timbre: Box::new(analyze_soundfont),
            reviewer: None,
        }
    }

    pub fn with_kind(kind: ExtractorKind) -> Self {
        Self::new(kind.build())
    }

    /// Replace the timbre analyzer (rendering plus spectral analysis by default).
    pub fn with_timbre_analyzer<F>(mut self, analyzer: F) -> Self
    where
        F: Fn(&Path) -> Result<Timbre> + Send + Sync + 'static,
    {
        self.timbre = Box::new(analyzer);
        self
    }

    /// Reviewer consulted in [`ScanMode::Interactive`].
    pub fn with_reviewer(mut self, reviewer: impl RecordReviewer + 'a) -> Self {
        self.reviewer = Some(Box::new(reviewer));
        self
    }

    /// Soundfont files under `directory`, sorted by path.
    pub fn discover(directory: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        if !directory.exists() {
            return Err(FontshelfError::FileNotFound(directory.to_path_buf()));
        }
        if !directory.is_dir() {
            return Err(FontshelfError::NotADirectory(directory.to_path_buf()));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(directory).max_depth(max_depth).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && is_soundfont(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Scan `options.directory` into `catalog`.
    ///
    /// Per-file problems land in [`ScanReport::failed`]. Only discovery and
    /// batch-save errors are returned. Cancellation, through `cancel` or the
    /// reviewer, stops the scan and is recorded in the report.
    pub fn scan(
        &mut self,
        catalog: &mut CatalogIndex,
        options: &ScanOptions,
        observer: &mut dyn ScanObserver,
        cancel: &CancellationToken,
    ) -> Result<ScanReport> {
        let files = Self::discover(&options.directory, options.recursive)?;
        let mut report = ScanReport {
            discovered: files.len(),
            ..ScanReport::default()
        };
        info!(
            "Scanning {} soundfonts in {} ({} mode, extractor {})",
            files.len(),
            options.directory.display(),
            options.mode,
            self.extractor.name()
        );

        let batch_size = options.batch_size.max(1);
        let mut since_batch = 0;

        for (i, path) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            observer.on_file(&ScanProgress {
                position: i + 1,
                total: files.len(),
                path,
            });

            match self.process(catalog, path, options) {
                Ok(Outcome::Added) => report.added += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Skipped) => {
                    report.skipped += 1;
                    continue;
                }
                Err(FontshelfError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    report.failed.push((path.clone(), e.to_string()));
                    continue;
                }
            }

            since_batch += 1;
            if since_batch >= batch_size {
                observer.on_batch(catalog)?;
                since_batch = 0;
            }
        }

        info!("Scan finished: {}", report);
        Ok(report)
    }

    fn process(&mut self, catalog: &mut CatalogIndex, path: &Path, options: &ScanOptions) -> Result<Outcome> {
        let key = path.to_string_lossy();
        let existing_hash = catalog.by_path(&key).map(|r| r.hash.clone());
        let mut extract_options = options.extract;
        let mut known_hash = None;

        if let Some(previous) = &existing_hash {
            if !options.force {
                if previous.is_empty() || !options.extract.compute_hash {
                    debug!("Skipping known soundfont {}", path.display());
                    return Ok(Outcome::Skipped);
                }
                let current = compute_sha256(path)?;
                if &current == previous {
                    debug!("Skipping unchanged soundfont {}", path.display());
                    return Ok(Outcome::Skipped);
                }
                debug!("Soundfont changed on disk: {}", path.display());
                extract_options.compute_hash = false;
                known_hash = Some(current);
            }
        }

        let mut extraction = self.extractor.extract(path, &extract_options);
        if let Some(hash) = known_hash {
            extraction.file.hash = Some(hash);
        }
        if extraction.file.file_size_bytes == 0 && extraction.file.hash.is_none() && !extraction.warnings.is_empty() {
            return Err(FontshelfError::ExtractionFailed {
                path: path.to_path_buf(),
                message: extraction.warnings.join("; "),
            });
        }

        let timbre = if options.analyze_timbre() {
            match (self.timbre)(path) {
                Ok(timbre) => Some(timbre),
                Err(e) => {
                    extraction.warn(format!("timbre analysis skipped: {e}"));
                    None
                }
            }
        } else {
            None
        };

        let mut record = record_from_extraction(&extraction, timbre, &options.thresholds);
        record.file_path = key.into_owned();

        if options.mode == ScanMode::Interactive {
            if let Some(reviewer) = self.reviewer.as_mut() {
                match reviewer.review(record, &extraction)? {
                    Some(reviewed) => record = reviewed,
                    None => return Ok(Outcome::Skipped),
                }
            }
        }

        catalog.insert_or_update(record, options.force)?;
        Ok(if existing_hash.is_some() {
            Outcome::Updated
        } else {
            Outcome::Added
        })
    }
}

fn is_soundfont(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ScanConfig::SOUNDFONT_EXTENSION))
}
