//! Terminal review of records during an interactive scan.

use fontshelf_core::catalog::{join_labels, split_labels};
use fontshelf_core::notes::{note_name, parse_note_name};
use fontshelf_core::{
    write_test_midi, CancellationToken, Extraction, FontshelfError, NoteRange, PlayOptions, Quality,
    RecordReviewer, Result, SoundfontRecord, SynthRunner,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;

/// Plays a short test phrase through each soundfont before it is reviewed.
pub struct Audition {
    runner: SynthRunner,
    options: PlayOptions,
    cancel: CancellationToken,
    midi: PathBuf,
    _dir: TempDir,
}

impl Audition {
    /// Write the test phrase to a temporary MIDI file.
    pub fn new(runner: SynthRunner, options: PlayOptions, cancel: CancellationToken) -> Result<Self> {
        let dir = TempDir::new()?;
        let midi = dir.path().join("test.mid");
        write_test_midi(&midi)?;
        Ok(Self {
            runner,
            options,
            cancel,
            midi,
            _dir: dir,
        })
    }

    pub fn play(&self, soundfont: &Path) -> Result<()> {
        self.runner
            .play(soundfont, &self.midi, &self.options, &self.cancel)
    }
}

/// [`RecordReviewer`] that shows each suggested record and lets the user
/// keep, edit or skip it.
///
/// End of input and `q` both stop the scan.
pub struct PromptReviewer<R, W> {
    input: R,
    output: W,
    audition: Option<Audition>,
}

impl<R: BufRead, W: Write> PromptReviewer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            audition: None,
        }
    }

    pub fn with_audition(mut self, audition: Audition) -> Self {
        self.audition = Some(audition);
        self
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(FontshelfError::Cancelled);
        }
        Ok(line.trim().to_string())
    }

    /// Ask for a value; an empty answer keeps `default`.
    fn ask(&mut self, label: &str, default: &str) -> Result<String> {
        write!(self.output, "{label} [{default}]: ")?;
        self.output.flush()?;
        let answer = self.read_line()?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    /// Ask until the answer is one of `options` (case-insensitive).
    fn choose(&mut self, label: &str, options: &[&str], default: &str) -> Result<String> {
        loop {
            let answer = self.ask(&format!("{label} ({})", options.join("/")), default)?;
            let answer = answer.to_lowercase();
            if options.contains(&answer.as_str()) {
                return Ok(answer);
            }
            writeln!(self.output, "Please answer one of: {}", options.join(", "))?;
        }
    }

    fn ask_note(&mut self, label: &str, default: u8) -> Result<u8> {
        let default_name = note_name(default);
        loop {
            let answer = self.ask(label, &default_name)?;
            match parse_note_name(&answer) {
                Ok(note) => return Ok(note),
                Err(e) => writeln!(self.output, "{e}")?,
            }
        }
    }

    fn show(&mut self, record: &SoundfontRecord, extraction: &Extraction) -> Result<()> {
        let out = &mut self.output;
        writeln!(out)?;
        writeln!(out, "=== {} ===", record.file_name)?;
        writeln!(out, "name:            {}", record.name)?;
        writeln!(out, "instrument type: {}", record.instrument_type)?;
        writeln!(out, "quality:         {}", record.quality)?;
        writeln!(out, "tags:            {}", join_labels(&record.tags))?;
        writeln!(out, "genres:          {}", join_labels(&record.genre))?;
        if let Some(timbre) = &record.timbre {
            writeln!(out, "timbre:          {}", timbre.labels().join(", "))?;
        }
        if let Some(range) = &record.note_range {
            writeln!(
                out,
                "note range:      {} - {} ({} missing)",
                range.lowest_name(),
                range.highest_name(),
                range.missing.len()
            )?;
        }
        writeln!(
            out,
            "format:          {} Hz, {} bit, polyphony {}, {:.2} MB",
            record.sample_rate,
            record.bit_depth,
            record.polyphony,
            record.size_mb()
        )?;
        if !record.author.is_empty() {
            writeln!(out, "author:          {}", record.author)?;
        }
        if !record.license.is_empty() {
            writeln!(out, "license:         {}", record.license)?;
        }
        for warning in &extraction.warnings {
            writeln!(out, "warning:         {warning}")?;
        }
        Ok(())
    }

    fn edit(&mut self, mut record: SoundfontRecord) -> Result<SoundfontRecord> {
        record.name = self.ask("Name", &record.name.clone())?;
        record.instrument_type = self.ask("Instrument type", &record.instrument_type.clone())?;

        let quality = self.choose(
            "Quality",
            &["low", "medium", "high", "unknown"],
            record.quality.as_str(),
        )?;
        record.quality = Quality::from_str_lossy(&quality);

        let tags = self.ask("Tags (comma separated)", &join_labels(&record.tags))?;
        record.tags = split_labels(&tags);
        let genres = self.ask("Genres (comma separated)", &join_labels(&record.genre))?;
        record.genre = split_labels(&genres);

        record.license = self.ask("License", &record.license.clone())?;
        record.author = self.ask("Author", &record.author.clone())?;
        record.description = self.ask("Description", &record.description.clone())?;

        let current = record.note_range.clone();
        let (lowest, highest, missing) = match &current {
            Some(range) => (range.lowest, range.highest, range.missing.clone()),
            None => (0, 127, Vec::new()),
        };
        let lowest = self.ask_note("Lowest note", lowest)?;
        let highest = self.ask_note("Highest note", highest)?;
        if current.is_some() || (lowest, highest) != (0, 127) {
            record.note_range = Some(NoteRange::new(lowest, highest, missing));
        }

        Ok(record)
    }
}

impl<R: BufRead, W: Write> RecordReviewer for PromptReviewer<R, W> {
    fn review(&mut self, record: SoundfontRecord, extraction: &Extraction) -> Result<Option<SoundfontRecord>> {
        if let Some(audition) = &self.audition {
            match audition.play(&extraction.path) {
                Ok(()) => {}
                Err(FontshelfError::Cancelled) => return Err(FontshelfError::Cancelled),
                Err(e) => warn!("Could not play {}: {}", extraction.path.display(), e),
            }
        }

        self.show(&record, extraction)?;
        match self
            .choose("Keep, edit, skip or quit", &["k", "e", "s", "q"], "k")?
            .as_str()
        {
            "e" => self.edit(record).map(Some),
            "s" => Ok(None),
            "q" => Err(FontshelfError::Cancelled),
            _ => Ok(Some(record)),
        }
    }
}
