//! `sf-annotate`: scan a directory of soundfonts into a catalog.

use crate::load_settings;
use crate::prompt::{Audition, PromptReviewer};
use anyhow::{bail, Context, Result};
use clap::Parser;
use fontshelf_core::analysis::analyze_soundfont;
use fontshelf_core::library::ScanProgress;
use fontshelf_core::{
    export_csv, import_csv, load_catalog, record_from_extraction, save_catalog, CancellationToken,
    CatalogConfig, CatalogIndex, ExtractOptions, ExtractorKind, LibraryScanner, PlayOptions,
    QualityThresholds, ScanMode, ScanObserver, ScanOptions, Settings, SynthRunner,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "sf-annotate")]
#[command(about = "Scan, analyze and catalog SF2 soundfonts")]
pub struct AnnotateArgs {
    /// Directory containing soundfonts
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Catalog file to update
    #[arg(short, long, default_value = CatalogConfig::DEFAULT_CATALOG_FILE)]
    pub output: PathBuf,

    /// Analysis mode: basic, full or interactive
    #[arg(short, long, default_value = "full")]
    pub mode: ScanMode,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Re-analyze soundfonts already in the catalog
    #[arg(short, long)]
    pub force: bool,

    /// Play a test phrase through each soundfont before reviewing it
    #[arg(short, long)]
    pub play: bool,

    /// Audio driver for playback (detected when omitted)
    #[arg(long)]
    pub audio_driver: Option<String>,

    /// Prompt for manual metadata for every soundfont
    #[arg(long)]
    pub insert_data: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Save the catalog every N processed soundfonts
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Skip timbre analysis
    #[arg(long)]
    pub no_timbre_analysis: bool,

    /// Score ratio (0-1) at or above which quality is "high"
    #[arg(long)]
    pub quality_threshold: Option<f64>,

    /// Probe every key to find silent notes (slow)
    #[arg(long)]
    pub test_note_range: bool,

    /// Analyze a single soundfont and print the result without saving
    #[arg(long, value_name = "PATH")]
    pub test_sf: Option<PathBuf>,

    /// Metadata extractor: sf2 or file-stat
    #[arg(long)]
    pub extractor: Option<ExtractorKind>,

    /// Write the catalog to a CSV file and exit
    #[arg(long, value_name = "PATH")]
    pub export_csv: Option<PathBuf>,

    /// Merge records from a CSV file into the catalog and exit
    #[arg(long, value_name = "PATH")]
    pub import_csv: Option<PathBuf>,

    /// Print catalog statistics and exit
    #[arg(long)]
    pub stats: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

impl AnnotateArgs {
    /// Mode the scan actually runs in. Manual entry needs the reviewer, so
    /// `--insert-data` promotes any mode to interactive.
    pub fn effective_mode(&self) -> ScanMode {
        if self.insert_data {
            ScanMode::Interactive
        } else {
            self.mode
        }
    }

    /// Whether the run only maintains the catalog instead of scanning.
    pub fn is_maintenance(&self) -> bool {
        self.import_csv.is_some() || self.export_csv.is_some() || self.stats
    }

    /// Fold command-line overrides into `settings`.
    pub fn apply_to(&self, settings: &mut Settings) -> Result<()> {
        if let Some(kind) = self.extractor {
            settings.extractor = kind;
        }
        if let Some(driver) = &self.audio_driver {
            settings.audio_driver = Some(driver.clone());
        }
        if let Some(size) = self.batch_size {
            settings.batch_size = size;
        }
        if let Some(threshold) = self.quality_threshold {
            settings.quality = QualityThresholds::with_high(threshold)?;
        }
        settings.validate()?;
        Ok(())
    }

    fn scan_options(&self, settings: &Settings) -> ScanOptions {
        let mode = self.effective_mode();
        ScanOptions {
            recursive: self.recursive,
            force: self.force,
            mode,
            // Basic stays cheap even when promoted for manual entry.
            skip_timbre: self.no_timbre_analysis || self.mode == ScanMode::Basic,
            batch_size: settings.batch_size,
            extract: ExtractOptions {
                probe_note_range: self.test_note_range,
                ..ExtractOptions::default()
            },
            thresholds: settings.quality,
            ..ScanOptions::new(&self.directory)
        }
    }
}

/// Persists the catalog every batch so an interrupted scan keeps its work.
struct BatchSaver<'a> {
    path: &'a Path,
}

impl ScanObserver for BatchSaver<'_> {
    fn on_file(&mut self, progress: &ScanProgress<'_>) {
        info!(
            "[{}/{}] {}",
            progress.position,
            progress.total,
            progress.path.display()
        );
    }

    fn on_batch(&mut self, catalog: &CatalogIndex) -> fontshelf_core::Result<()> {
        info!("Saving progress ({} soundfonts)", catalog.len());
        save_catalog(self.path, catalog)
    }
}

fn play_options(settings: &Settings) -> PlayOptions {
    PlayOptions {
        driver: settings.audio_driver.clone(),
        gain: settings.gain,
        sample_rate: settings.sample_rate,
        timeout: settings.synth_timeout(),
    }
}

/// Locate fluidsynth for `--play`; a missing synthesizer only disables playback.
fn audition(settings: &Settings, cancel: &CancellationToken) -> Option<Audition> {
    let runner = match SynthRunner::locate(settings.fluidsynth_path.as_deref()) {
        Ok(runner) => runner,
        Err(e) => {
            warn!("{}; continuing without audio playback", e);
            return None;
        }
    };
    match Audition::new(runner, play_options(settings), cancel.clone()) {
        Ok(audition) => Some(audition),
        Err(e) => {
            warn!("Could not prepare test phrase: {}", e);
            None
        }
    }
}

/// Run `sf-annotate`.
pub fn run(args: &AnnotateArgs, cancel: &CancellationToken) -> Result<ExitCode> {
    let mut settings = load_settings(args.settings.as_deref())?;
    args.apply_to(&mut settings)?;

    if let Some(path) = &args.test_sf {
        return test_soundfont(args, &settings, path, cancel);
    }
    if args.is_maintenance() {
        return maintain(args);
    }

    let mut catalog = load_catalog(&args.output)
        .with_context(|| format!("Failed to load catalog {}", args.output.display()))?;
    let options = args.scan_options(&settings);
    debug!("Scan options: {:?}", options);

    let mut scanner = LibraryScanner::with_kind(settings.extractor);
    if options.mode == ScanMode::Interactive {
        let mut reviewer = PromptReviewer::new(io::stdin().lock(), io::stdout());
        if args.play {
            if let Some(audition) = audition(&settings, cancel) {
                reviewer = reviewer.with_audition(audition);
            }
        }
        scanner = scanner.with_reviewer(reviewer);
    } else if args.play {
        warn!("--play only applies to interactive review; ignoring it");
    }

    let mut saver = BatchSaver { path: &args.output };
    let report = scanner
        .scan(&mut catalog, &options, &mut saver, cancel)
        .with_context(|| format!("Failed to scan {}", args.directory.display()))?;

    if report.processed() > 0 {
        save_catalog(&args.output, &catalog)
            .with_context(|| format!("Failed to save catalog {}", args.output.display()))?;
        info!("Catalog saved to {}", args.output.display());
    }

    for (path, message) in &report.failed {
        warn!("Failed: {}: {}", path.display(), message);
    }
    println!("Scan: {report}");
    println!();
    print!("{}", catalog.statistics());

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// CSV import, CSV export and statistics, in that order.
fn maintain(args: &AnnotateArgs) -> Result<ExitCode> {
    let mut catalog = load_catalog(&args.output)
        .with_context(|| format!("Failed to load catalog {}", args.output.display()))?;

    if let Some(path) = &args.import_csv {
        let records = import_csv(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let read = records.len();
        let changed = catalog.import_records(records, args.force);
        save_catalog(&args.output, &catalog)
            .with_context(|| format!("Failed to save catalog {}", args.output.display()))?;
        println!("Imported {changed} of {read} records from {}", path.display());
    }

    if let Some(path) = &args.export_csv {
        let count = export_csv(path, catalog.all())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Exported {count} records to {}", path.display());
    }

    if args.stats {
        print!("{}", catalog.statistics());
    }
    Ok(ExitCode::SUCCESS)
}

/// Analyze one file and print the record it would produce.
fn test_soundfont(
    args: &AnnotateArgs,
    settings: &Settings,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    if !path.is_file() {
        bail!("Soundfont file not found: {}", path.display());
    }

    let options = args.scan_options(settings);
    let extraction = settings.extractor.build().extract(path, &options.extract);
    let timbre = if options.analyze_timbre() {
        analyze_soundfont(path)
            .inspect_err(|e| warn!("Timbre analysis failed: {}", e))
            .ok()
    } else {
        None
    };
    let record = record_from_extraction(&extraction, timbre, &settings.quality);

    println!(
        "{}",
        serde_json::to_string_pretty(&record).context("Failed to format record")?
    );
    if let Some(range) = &record.note_range {
        println!("Note range: {} - {}", range.lowest_name(), range.highest_name());
        if range.missing.is_empty() {
            println!("No missing notes in range");
        } else {
            println!("Missing notes: {}", range.missing_names().join(", "));
        }
    }
    for warning in &extraction.warnings {
        println!("Warning: {warning}");
    }

    if args.play {
        if let Some(audition) = audition(settings, cancel) {
            if let Err(e) = audition.play(path) {
                warn!("Playback failed: {}", e);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
