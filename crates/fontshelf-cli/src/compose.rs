//! `sf-compose`: generate a short piece and play it with a cataloged soundfont.

use crate::load_settings;
use anyhow::{bail, Context, Result};
use clap::Parser;
use fontshelf_core::catalog::{join_labels, split_labels};
use fontshelf_core::notes::pitch_class;
use fontshelf_core::{
    generate, load_catalog, write_midi, CancellationToken, CatalogConfig, CatalogIndex, CatalogRng,
    CompositionRequest, FilterCriteria, FontshelfError, PlayOptions, Quality, ScaleType, Settings,
    SoundfontRecord, SoundfontSelection, Style, SynthConfig, SynthRunner,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "sf-compose")]
#[command(about = "Generate MIDI compositions and play them with cataloged soundfonts")]
pub struct ComposeArgs {
    /// Catalog file
    #[arg(short = 'd', long, default_value = CatalogConfig::DEFAULT_CATALOG_FILE)]
    pub db: PathBuf,

    /// Base directory for relative soundfont paths in the catalog
    #[arg(short = 's', long)]
    pub sf_dir: Option<PathBuf>,

    /// MIDI file to write
    #[arg(short, long, default_value = "composition.mid")]
    pub output: PathBuf,

    /// Key of the composition (C, F#, Bb, ...)
    #[arg(short, long, default_value = "C")]
    pub key: String,

    /// Tempo in beats per minute
    #[arg(short, long, default_value_t = 120.0)]
    pub tempo: f64,

    /// Number of measures
    #[arg(short, long, default_value_t = 4)]
    pub measures: u32,

    /// Scale (major, minor, dorian, blues, ...)
    #[arg(long, default_value = "major")]
    pub scale: ScaleType,

    /// Style: pop, rock, jazz or classical
    #[arg(long, default_value = "pop")]
    pub style: Style,

    /// Play with the soundfont with this id
    #[arg(long)]
    pub sf_id: Option<u64>,

    /// Pick a soundfont of this instrument type
    #[arg(long)]
    pub instrument_type: Option<String>,

    /// Pick a soundfont of this quality
    #[arg(long)]
    pub quality: Option<Quality>,

    /// Pick a soundfont carrying all of these comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,

    /// Write the MIDI file without playing it
    #[arg(long)]
    pub no_play: bool,

    /// Also render the composition to this WAV file
    #[arg(long, value_name = "WAV")]
    pub render: Option<PathBuf>,

    /// List the cataloged soundfonts and exit
    #[arg(long)]
    pub list_soundfonts: bool,

    /// Show the soundfonts most similar to this id and exit
    #[arg(long, value_name = "ID")]
    pub similar: Option<u64>,

    /// Search the catalog and exit
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Maximum results for --similar and --search
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Seed for reproducible compositions and soundfont picks
    #[arg(long)]
    pub seed: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

impl ComposeArgs {
    pub fn request(&self) -> Result<CompositionRequest> {
        let request = CompositionRequest {
            key: pitch_class(&self.key)?,
            scale: self.scale,
            tempo: self.tempo,
            measures: self.measures,
            style: self.style,
        };
        request.validate()?;
        Ok(request)
    }

    /// How the playback soundfont is chosen: an explicit id wins over criteria.
    pub fn selection(&self) -> SoundfontSelection {
        if let Some(id) = self.sf_id {
            return SoundfontSelection::Id(id);
        }
        let mut criteria = FilterCriteria::new();
        if let Some(instrument_type) = &self.instrument_type {
            criteria = criteria.with_instrument_type(instrument_type.as_str());
        }
        if let Some(quality) = self.quality {
            criteria = criteria.with_quality(quality);
        }
        if let Some(tags) = &self.tags {
            criteria = criteria.with_tags(split_labels(tags));
        }
        SoundfontSelection::Matching(criteria)
    }

    fn is_query(&self) -> bool {
        self.list_soundfonts || self.similar.is_some() || self.search.is_some()
    }

    fn wants_audio(&self) -> bool {
        !self.no_play || self.render.is_some()
    }
}

fn summary(record: &SoundfontRecord) -> String {
    format!(
        "{:>4}  {}  [{}, {}]  {:.2} MB",
        record.id,
        record.name,
        record.instrument_type,
        record.quality,
        record.size_mb()
    )
}

fn query(args: &ComposeArgs, catalog: &CatalogIndex, settings: &Settings) -> Result<ExitCode> {
    if args.list_soundfonts {
        if catalog.is_empty() {
            println!("No soundfonts in {}", args.db.display());
        }
        for record in catalog.all() {
            println!("{}", summary(record));
        }
    }

    if let Some(id) = args.similar {
        let source = catalog.require(id)?;
        println!("Most similar to {}:", source.name);
        for rec in catalog.similar_with(id, args.limit, &settings.similarity)? {
            println!("{:.3}  {}", rec.score, summary(rec.record));
        }
    }

    if let Some(text) = &args.search {
        let hits = catalog.search(text);
        if hits.is_empty() {
            println!("No soundfonts match '{text}'");
        }
        for hit in hits.iter().take(args.limit) {
            println!("{:>3}  {}", hit.score, summary(hit.record));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn play_and_render(
    args: &ComposeArgs,
    runner: &SynthRunner,
    soundfont: &Path,
    options: &PlayOptions,
    cancel: &CancellationToken,
) -> fontshelf_core::Result<()> {
    if let Some(wav) = &args.render {
        let render_options = PlayOptions {
            timeout: options.timeout.max(SynthConfig::RENDER_TIMEOUT),
            ..options.clone()
        };
        runner.render(soundfont, &args.output, wav, &render_options, cancel)?;
        println!("Rendered {}", wav.display());
    }
    if !args.no_play {
        runner.play(soundfont, &args.output, options, cancel)?;
    }
    Ok(())
}

/// Run `sf-compose`.
pub fn run(args: &ComposeArgs, cancel: &CancellationToken) -> Result<ExitCode> {
    let settings = load_settings(args.settings.as_deref())?;

    if args.is_query() {
        let catalog = load_catalog(&args.db)
            .with_context(|| format!("Failed to load catalog {}", args.db.display()))?;
        return query(args, &catalog, &settings);
    }

    let request = args.request()?;
    let mut rng = CatalogRng::from_optional_seed(args.seed);
    let composition = generate(&request, &mut rng)?;
    write_midi(&composition, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!(
        "Wrote {} ({} {}, {}, {} bpm, {} measures, {} notes)",
        args.output.display(),
        request.key_name(),
        request.scale,
        request.style,
        request.tempo,
        request.measures,
        composition.note_count()
    );

    if !args.wants_audio() {
        return Ok(ExitCode::SUCCESS);
    }

    let catalog = load_catalog(&args.db)
        .with_context(|| format!("Failed to load catalog {}", args.db.display()))?;
    let record = match catalog.select_for_playback(&args.selection(), &mut rng) {
        Ok(record) => record,
        Err(e @ FontshelfError::Validation { .. }) => {
            warn!("{}; skipping playback", e);
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Err(e.into()),
    };
    let soundfont = record.absolute_path(args.sf_dir.as_deref());
    if !soundfont.is_file() {
        bail!(
            "Soundfont file not found: {} (use --sf-dir for relative catalog paths)",
            soundfont.display()
        );
    }
    info!(
        "Using soundfont {} ({}, {}, tags: {})",
        record.name,
        record.instrument_type,
        record.quality,
        join_labels(&record.tags)
    );

    let runner = match SynthRunner::locate(settings.fluidsynth_path.as_deref()) {
        Ok(runner) => runner,
        Err(e) if e.is_degraded_capability() => {
            warn!("{}; MIDI written without playback", e);
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Err(e.into()),
    };
    let options = PlayOptions {
        driver: settings.audio_driver.clone(),
        gain: settings.gain,
        sample_rate: settings.sample_rate,
        timeout: settings.synth_timeout(),
    };

    match play_and_render(args, &runner, &soundfont, &options, cancel) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(FontshelfError::Cancelled) => {
            warn!("Playback interrupted");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(anyhow::Error::new(e).context("Synthesizer failed")),
    }
}
