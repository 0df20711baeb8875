//! Heuristic suggestions: instrument type, polyphony, note range, quality,
//! genres and tags.
//!
//! Everything here is a pure function of extracted facts, so the results can
//! be reviewed (and overridden) before a record enters the catalog.

use crate::catalog::{
    normalize_labels, Attack, Brightness, HarmonicQuality, NoteRange, Quality, Richness,
    SoundfontRecord, Timbre, UNKNOWN_INSTRUMENT,
};
use crate::config::CatalogConfig;
use crate::error::{FontshelfError, Result};
use crate::extract::Extraction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Instrument type for soundfonts whose presets span several families.
pub const MULTI_INSTRUMENT: &str = "multi";

/// Keyword table for instrument inference. More specific keywords come
/// first so that "electric piano" is a keyboard and "contrabass" a string.
const INSTRUMENT_KEYWORDS: &[(&str, &str)] = &[
    ("electric piano", "keyboard"),
    ("e-piano", "keyboard"),
    ("epiano", "keyboard"),
    ("rhodes", "keyboard"),
    ("wurlitzer", "keyboard"),
    ("clavi", "keyboard"),
    ("mellotron", "keyboard"),
    ("keyboard", "keyboard"),
    ("piano", "piano"),
    ("grand", "piano"),
    ("upright", "piano"),
    ("organ", "organ"),
    ("guitar", "guitar"),
    ("contrabass", "strings"),
    ("string", "strings"),
    ("violin", "strings"),
    ("viola", "strings"),
    ("cello", "strings"),
    ("bass", "bass"),
    ("drum", "drums"),
    ("kit", "drums"),
    ("percussion", "percussion"),
    ("marimba", "percussion"),
    ("vibraphone", "percussion"),
    ("xylophone", "percussion"),
    ("mallet", "percussion"),
    ("cymbal", "percussion"),
    ("horn", "brass"),
    ("trumpet", "brass"),
    ("trombone", "brass"),
    ("tuba", "brass"),
    ("brass", "brass"),
    ("sax", "woodwind"),
    ("flute", "woodwind"),
    ("clarinet", "woodwind"),
    ("oboe", "woodwind"),
    ("woodwind", "woodwind"),
    ("synth", "synthesizer"),
    ("pad", "synthesizer"),
    ("lead", "synthesizer"),
    ("sfx", "effects"),
    ("effect", "effects"),
    ("choir", "vocal"),
    ("voice", "vocal"),
    ("vocal", "vocal"),
    ("orch", "orchestral"),
    ("ensemble", "ensemble"),
    ("harp", "harp"),
];

/// Instrument words that become tags when they appear in a soundfont's name.
const NAME_TAG_WORDS: &[&str] = &[
    "piano", "guitar", "bass", "drum", "synth", "strings", "brass", "organ",
];

/// Infer an instrument family from one preset, instrument or file name.
pub fn infer_instrument_type(name: &str) -> Option<&'static str> {
    let lowered = name.to_lowercase();
    INSTRUMENT_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, kind)| *kind)
}

/// Instrument type for a whole soundfont.
///
/// One distinct family across `names` wins outright; several give
/// [`MULTI_INSTRUMENT`]. With no hits the file name decides, and failing that
/// the type is unknown.
pub fn infer_soundfont_type<I, S>(names: I, file_name: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let kinds: BTreeSet<&'static str> = names
        .into_iter()
        .filter_map(|n| infer_instrument_type(n.as_ref()))
        .collect();

    match kinds.len() {
        0 => {
            let stem = Path::new(file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            infer_instrument_type(&stem)
                .unwrap_or(UNKNOWN_INSTRUMENT)
                .to_string()
        }
        1 => kinds.into_iter().next().unwrap_or(UNKNOWN_INSTRUMENT).to_string(),
        _ => MULTI_INSTRUMENT.to_string(),
    }
}

/// Voices a soundfont is likely to need, from its size.
pub fn estimate_polyphony(sample_count: usize, instrument_count: usize) -> u32 {
    let score = sample_count as f64 * 0.7 + instrument_count as f64 * 0.3;
    if score <= 10.0 {
        32
    } else if score <= 30.0 {
        64
    } else {
        128
    }
}

/// Typical playable range for an instrument family, used when the file
/// carries no key information.
pub fn default_note_range(instrument_type: &str) -> NoteRange {
    let (lowest, highest) = match instrument_type {
        "bass" => (28, 67),
        "guitar" => (40, 88),
        "piano" => (21, 108),
        "brass" | "woodwind" => (41, 88),
        "drums" | "percussion" => (35, 81),
        _ => (36, 96),
    };
    NoteRange::new(lowest, highest, [])
}

/// Score ratios at which a soundfont counts as high or medium quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            high: 0.7,
            medium: 0.4,
        }
    }
}

impl QualityThresholds {
    /// Thresholds with `high` overridden, keeping `medium` below it.
    pub fn with_high(high: f64) -> Result<Self> {
        let defaults = Self::default();
        let thresholds = Self {
            high,
            medium: defaults.medium.min(high),
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.high) || !in_unit(self.medium) || self.medium > self.high {
            return Err(FontshelfError::validation(
                "quality_threshold",
                format!(
                    "need 0 <= medium <= high <= 1, got medium {} and high {}",
                    self.medium, self.high
                ),
            ));
        }
        Ok(())
    }

    pub fn classify(&self, ratio: f64) -> Quality {
        if ratio >= self.high {
            Quality::High
        } else if ratio >= self.medium {
            Quality::Medium
        } else {
            Quality::Low
        }
    }
}

/// Suggest a quality from size, sample format, key coverage and, when known,
/// timbre richness. Each factor scores 0 to 2 points.
pub fn suggest_quality(record: &SoundfontRecord, thresholds: &QualityThresholds) -> Quality {
    let size_mb = record.file_size_bytes as f64 / CatalogConfig::BYTES_PER_MB;
    let size = if size_mb > 30.0 {
        2
    } else if size_mb > 10.0 {
        1
    } else {
        0
    };

    let sample_rate = match record.sample_rate {
        r if r >= 44_100 => 2,
        r if r >= 22_050 => 1,
        _ => 0,
    };

    let bit_depth = match record.bit_depth {
        b if b >= 24 => 2,
        b if b >= 16 => 1,
        _ => 0,
    };

    let missing = record.note_range.as_ref().map_or(0, |r| r.missing.len());
    let coverage = if missing < 5 {
        2
    } else if missing < 20 {
        1
    } else {
        0
    };

    let mut points = size + sample_rate + bit_depth + coverage;
    let mut max_points = 8;

    if let Some(timbre) = &record.timbre {
        points += match timbre.richness {
            Richness::VeryRich => 2,
            Richness::Rich | Richness::Medium => 1,
            Richness::Simple => 0,
        };
        max_points += 2;
    }

    thresholds.classify(f64::from(points) / f64::from(max_points))
}

/// Genres that suit a timbre. `None` yields no suggestion.
pub fn suggest_genres(timbre: Option<&Timbre>) -> BTreeSet<String> {
    let Some(t) = timbre else {
        return BTreeSet::new();
    };

    let mut genres: Vec<&str> = Vec::new();
    if t.brightness == Brightness::Bright && t.attack == Attack::Hard {
        genres.extend(["rock", "metal", "electronic"]);
    }
    if t.brightness == Brightness::Dark && t.harmonic_quality == HarmonicQuality::Harmonic {
        genres.extend(["classical", "jazz", "ambient"]);
    }
    if t.richness == Richness::Rich && t.harmonic_quality == HarmonicQuality::Harmonic {
        genres.extend(["classical", "orchestral", "film"]);
    }
    if t.attack == Attack::Soft && t.harmonic_quality == HarmonicQuality::Harmonic {
        genres.extend(["ambient", "new age", "chill"]);
    }
    if t.brightness == Brightness::Medium && t.attack == Attack::Medium {
        genres.extend(["pop", "folk", "world"]);
    }
    if t.harmonic_quality == HarmonicQuality::Percussive {
        genres.extend(["percussion", "hip hop", "electronic"]);
    }
    if t.brightness == Brightness::Dark && t.attack == Attack::Soft {
        genres.extend(["ambient", "chill"]);
    }
    if t.brightness == Brightness::Bright && t.richness == Richness::Simple {
        genres.extend(["electronic", "techno"]);
    }
    if genres.is_empty() {
        genres.push("versatile");
    }
    normalize_labels(genres)
}

/// Tags derived from everything else known about a record.
pub fn suggest_tags(record: &SoundfontRecord) -> BTreeSet<String> {
    let mut tags: Vec<String> = Vec::new();
    if record.has_known_instrument_type() {
        tags.push(record.instrument_type.clone());
    }
    if let Some(timbre) = &record.timbre {
        tags.extend(timbre.labels().iter().map(|l| l.to_string()));
    }
    if record.quality != Quality::Unknown {
        tags.push(record.quality.to_string());
    }
    tags.extend(record.genre.iter().cloned());

    let name = record.name.to_lowercase();
    tags.extend(
        NAME_TAG_WORDS
            .iter()
            .filter(|word| name.contains(*word))
            .map(|word| word.to_string()),
    );
    normalize_labels(tags)
}

/// Build a catalog record from an extraction plus optional timbre.
///
/// Facts the extraction lacks stay at their unknown defaults; quality is
/// only suggested when the SF2 structure could be read.
pub fn record_from_extraction(
    extraction: &Extraction,
    timbre: Option<Timbre>,
    thresholds: &QualityThresholds,
) -> SoundfontRecord {
    let mut record = SoundfontRecord::new(extraction.path.to_string_lossy());
    if !extraction.file.file_name.is_empty() {
        record.file_name = extraction.file.file_name.clone();
    }
    record.file_size_bytes = extraction.file.file_size_bytes;
    record.last_modified = extraction.file.last_modified;
    record.hash = extraction.file.hash.clone().unwrap_or_default();
    record.timbre = timbre;

    match &extraction.sf2 {
        Some(sf2) => {
            if !sf2.bank_name.is_empty() {
                record.name = sf2.bank_name.clone();
            }
            record.author = if sf2.author.is_empty() {
                sf2.copyright.clone()
            } else {
                sf2.author.clone()
            };
            record.license = sf2.copyright.clone();
            record.description = sf2.comments.clone();

            record.instrument_type = infer_soundfont_type(&sf2.preset_names, &record.file_name);
            if record.instrument_type == UNKNOWN_INSTRUMENT {
                record.instrument_type =
                    infer_soundfont_type(&sf2.instrument_names, &record.file_name);
            }

            record.polyphony = estimate_polyphony(sf2.sample_count, sf2.instrument_names.len());
            record.sample_rate = sf2.sample_rate.unwrap_or(0);
            record.bit_depth = sf2.bit_depth;
            record.note_range = NoteRange::from_covered_keys(&sf2.covered_keys)
                .or_else(|| Some(default_note_range(&record.instrument_type)));
            record.quality = suggest_quality(&record, thresholds);
        }
        None => {
            record.instrument_type =
                infer_soundfont_type(Vec::<String>::new(), &record.file_name);
        }
    }

    record.genre = suggest_genres(record.timbre.as_ref());
    record.tags = suggest_tags(&record);
    record.normalize();
    record
}
