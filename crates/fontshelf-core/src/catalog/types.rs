//! Record types stored in the catalog.

use super::normalize::{normalize_label, normalize_labels};
use crate::config::CatalogConfig;
use crate::error::{FontshelfError, Result};
use crate::notes::{note_name, parse_note_name};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Instrument type stored when nothing better is known.
pub const UNKNOWN_INSTRUMENT: &str = "unknown";

// ============================================================================
// Quality
// ============================================================================

/// Ordered quality category.
///
/// `Unknown` sorts before `Low` but has no rank: it never counts as equal or
/// adjacent to anything when comparing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Quality {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

impl Quality {
    pub const ALL: [Quality; 4] = [Quality::Unknown, Quality::Low, Quality::Medium, Quality::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Unknown => "unknown",
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }

    /// Position on the low..high scale, `None` for `Unknown`.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Quality::Unknown => None,
            Quality::Low => Some(0),
            Quality::Medium => Some(1),
            Quality::High => Some(2),
        }
    }

    /// Parse leniently: anything unrecognized becomes `Unknown`.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or(Quality::Unknown)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = FontshelfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            "unknown" | "" => Ok(Quality::Unknown),
            other => Err(FontshelfError::validation(
                "quality",
                format!("expected low, medium, high or unknown, got '{other}'"),
            )),
        }
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|r| Quality::from_str_lossy(&r)).unwrap_or_default())
    }
}

// ============================================================================
// Timbre
// ============================================================================

macro_rules! ordered_category {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Position on the ordered scale, starting at 0.
            pub fn rank(&self) -> u8 {
                *self as u8
            }

            /// Category for `value` given three ascending thresholds.
            pub fn from_thresholds(value: f32, thresholds: [f32; 3]) -> Self {
                let index = thresholds.iter().take_while(|t| value >= **t).count();
                Self::ALL[index.min(Self::ALL.len() - 1)]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = FontshelfError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_lowercase().replace('_', " ");
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| FontshelfError::validation($field, format!("unknown value '{s}'")))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

ordered_category!(
    /// Spectral brightness, from the spectral centroid.
    Brightness, "brightness" {
        Dark => "dark",
        Medium => "medium",
        Bright => "bright",
        VeryBright => "very bright",
    }
);

ordered_category!(
    /// Spectral richness, from the spectral bandwidth.
    Richness, "richness" {
        Simple => "simple",
        Medium => "medium",
        Rich => "rich",
        VeryRich => "very rich",
    }
);

ordered_category!(
    /// Attack character, from the zero-crossing rate.
    Attack, "attack" {
        Soft => "soft",
        Medium => "medium",
        Hard => "hard",
        Aggressive => "aggressive",
    }
);

ordered_category!(
    /// Harmonic versus percussive energy balance.
    HarmonicQuality, "harmonic_quality" {
        Percussive => "percussive",
        Balanced => "balanced",
        Harmonic => "harmonic",
        VeryHarmonic => "very harmonic",
    }
);

/// Raw spectral measurements behind a [`Timbre`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TimbreFeatures {
    pub spectral_centroid: f32,
    pub spectral_bandwidth: f32,
    pub spectral_rolloff: f32,
    pub zero_crossing_rate: f32,
    pub harmonic_ratio: f32,
}

/// Structured timbre descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timbre {
    pub brightness: Brightness,
    pub richness: Richness,
    pub attack: Attack,
    pub harmonic_quality: HarmonicQuality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<TimbreFeatures>,
}

impl Default for Timbre {
    fn default() -> Self {
        Self {
            brightness: Brightness::Medium,
            richness: Richness::Medium,
            attack: Attack::Medium,
            harmonic_quality: HarmonicQuality::Balanced,
            features: None,
        }
    }
}

impl Timbre {
    pub fn new(
        brightness: Brightness,
        richness: Richness,
        attack: Attack,
        harmonic_quality: HarmonicQuality,
    ) -> Self {
        Self {
            brightness,
            richness,
            attack,
            harmonic_quality,
            features: None,
        }
    }

    /// Sum of absolute rank differences across the four categories.
    pub fn rank_distance(&self, other: &Timbre) -> u32 {
        let diff = |a: u8, b: u8| u32::from(a.abs_diff(b));
        diff(self.brightness.rank(), other.brightness.rank())
            + diff(self.richness.rank(), other.richness.rank())
            + diff(self.attack.rank(), other.attack.rank())
            + diff(self.harmonic_quality.rank(), other.harmonic_quality.rank())
    }

    /// Largest possible [`rank_distance`](Self::rank_distance).
    pub fn max_rank_distance() -> u32 {
        [
            Brightness::ALL.len(),
            Richness::ALL.len(),
            Attack::ALL.len(),
            HarmonicQuality::ALL.len(),
        ]
        .iter()
        .map(|len| (*len as u32).saturating_sub(1))
        .sum()
    }

    /// Category label for one attribute.
    pub fn value(&self, attribute: TimbreAttribute) -> &'static str {
        match attribute {
            TimbreAttribute::Brightness => self.brightness.as_str(),
            TimbreAttribute::Richness => self.richness.as_str(),
            TimbreAttribute::Attack => self.attack.as_str(),
            TimbreAttribute::HarmonicQuality => self.harmonic_quality.as_str(),
        }
    }

    /// The four category labels, in attribute order.
    pub fn labels(&self) -> [&'static str; 4] {
        [
            self.brightness.as_str(),
            self.richness.as_str(),
            self.attack.as_str(),
            self.harmonic_quality.as_str(),
        ]
    }
}

// Older catalogs stored timbre as free text or as a dict with unrecognized
// values. Free text carries no categories; bad values fall back to defaults.
#[derive(Deserialize)]
#[serde(untagged)]
enum TimbreRepr {
    Fields(RawTimbre),
    Text(String),
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTimbre {
    brightness: Option<String>,
    richness: Option<String>,
    attack: Option<String>,
    harmonic_quality: Option<String>,
    features: Option<TimbreFeatures>,
}

fn parse_or<T: FromStr>(raw: Option<String>, fallback: T) -> T {
    raw.and_then(|s| s.parse().ok()).unwrap_or(fallback)
}

fn deserialize_timbre<'de, D>(deserializer: D) -> std::result::Result<Option<Timbre>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<TimbreRepr>::deserialize(deserializer)?;
    Ok(match repr {
        Some(TimbreRepr::Fields(raw)) => {
            let defaults = Timbre::default();
            Some(Timbre {
                brightness: parse_or(raw.brightness, defaults.brightness),
                richness: parse_or(raw.richness, defaults.richness),
                attack: parse_or(raw.attack, defaults.attack),
                harmonic_quality: parse_or(raw.harmonic_quality, defaults.harmonic_quality),
                features: raw.features,
            })
        }
        Some(TimbreRepr::Text(_)) | None => None,
    })
}

/// One of the four timbre attributes, for lookups such as `by_timbre`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimbreAttribute {
    Brightness,
    Richness,
    Attack,
    HarmonicQuality,
}

impl TimbreAttribute {
    pub const ALL: [TimbreAttribute; 4] = [
        TimbreAttribute::Brightness,
        TimbreAttribute::Richness,
        TimbreAttribute::Attack,
        TimbreAttribute::HarmonicQuality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimbreAttribute::Brightness => "brightness",
            TimbreAttribute::Richness => "richness",
            TimbreAttribute::Attack => "attack",
            TimbreAttribute::HarmonicQuality => "harmonic_quality",
        }
    }
}

impl FromStr for TimbreAttribute {
    type Err = FontshelfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "brightness" => Ok(TimbreAttribute::Brightness),
            "richness" => Ok(TimbreAttribute::Richness),
            "attack" => Ok(TimbreAttribute::Attack),
            "harmonic_quality" | "harmonic" | "harmonicity" => Ok(TimbreAttribute::HarmonicQuality),
            other => Err(FontshelfError::validation(
                "timbre_attribute",
                format!("unknown attribute '{other}'"),
            )),
        }
    }
}

// ============================================================================
// Note range
// ============================================================================

/// Playable key range plus the keys inside it that produce no sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRange {
    #[serde(rename = "min_note", with = "note_serde")]
    pub lowest: u8,
    #[serde(rename = "max_note", with = "note_serde")]
    pub highest: u8,
    #[serde(rename = "missing_notes", default, with = "note_list_serde")]
    pub missing: Vec<u8>,
}

impl NoteRange {
    /// Build a range, swapping the bounds if reversed and keeping only
    /// sorted, unique missing notes that lie strictly inside the bounds.
    pub fn new(lowest: u8, highest: u8, missing: impl IntoIterator<Item = u8>) -> Self {
        let (lowest, highest) = if lowest <= highest {
            (lowest, highest)
        } else {
            (highest, lowest)
        };
        let missing: BTreeSet<u8> = missing
            .into_iter()
            .filter(|n| (lowest..=highest).contains(n))
            .collect();
        Self {
            lowest,
            highest,
            missing: missing.into_iter().collect(),
        }
    }

    /// Derive a range from the set of keys that actually sound.
    pub fn from_covered_keys(covered: &BTreeSet<u8>) -> Option<Self> {
        let lowest = *covered.first()?;
        let highest = *covered.last()?;
        let missing = (lowest..=highest).filter(|k| !covered.contains(k));
        Some(Self::new(lowest, highest, missing))
    }

    pub fn span(&self) -> u8 {
        self.highest - self.lowest + 1
    }

    pub fn lowest_name(&self) -> String {
        note_name(self.lowest)
    }

    pub fn highest_name(&self) -> String {
        note_name(self.highest)
    }

    pub fn missing_names(&self) -> Vec<String> {
        self.missing.iter().map(|n| note_name(*n)).collect()
    }
}

// Notes are written as names ("C4") and read back from names or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum NoteRepr {
    Number(u8),
    Name(String),
}

impl NoteRepr {
    fn into_note(self) -> Result<u8> {
        match self {
            NoteRepr::Number(n) if n <= crate::notes::MAX_NOTE => Ok(n),
            NoteRepr::Number(n) => Err(FontshelfError::validation(
                "note",
                format!("{n} is outside the MIDI range"),
            )),
            NoteRepr::Name(name) => parse_note_name(&name),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawNoteRange {
    min_note: Option<NoteRepr>,
    max_note: Option<NoteRepr>,
    missing_notes: Vec<NoteRepr>,
}

// A range with an unreadable bound is dropped rather than failing the load.
fn deserialize_note_range<'de, D>(deserializer: D) -> std::result::Result<Option<NoteRange>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<RawNoteRange>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let bound = |repr: Option<NoteRepr>| repr.and_then(|r| r.into_note().ok());
    let (Some(lowest), Some(highest)) = (bound(raw.min_note), bound(raw.max_note)) else {
        return Ok(None);
    };
    let missing = raw
        .missing_notes
        .into_iter()
        .filter_map(|n| n.into_note().ok());
    Ok(Some(NoteRange::new(lowest, highest, missing)))
}

mod note_serde {
    use super::{note_name, NoteRepr};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(note: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&note_name(*note))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        NoteRepr::deserialize(deserializer)?
            .into_note()
            .map_err(serde::de::Error::custom)
    }
}

mod note_list_serde {
    use super::{note_name, NoteRepr};
    use serde::{ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(notes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(notes.len()))?;
        for note in notes {
            seq.serialize_element(&note_name(*note))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Vec::<NoteRepr>::deserialize(deserializer)?
            .into_iter()
            .map(|n| n.into_note().map_err(serde::de::Error::custom))
            .collect()
    }
}

// ============================================================================
// Soundfont record
// ============================================================================

/// One cataloged soundfont.
///
/// Unknown fields in a stored document are ignored and missing ones take the
/// defaults below, so older and newer catalogs both load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundfontRecord {
    pub id: u64,
    pub name: String,
    #[serde(alias = "path")]
    pub file_path: String,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub instrument_type: String,
    pub quality: Quality,
    pub tags: BTreeSet<String>,
    pub genre: BTreeSet<String>,
    #[serde(deserialize_with = "deserialize_timbre")]
    pub timbre: Option<Timbre>,
    #[serde(alias = "mapped_notes", deserialize_with = "deserialize_note_range")]
    pub note_range: Option<NoteRange>,
    pub polyphony: u32,
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub license: String,
    pub author: String,
    pub description: String,
    pub hash: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub last_modified: Option<DateTime<Utc>>,
    pub date_added: DateTime<Utc>,
}

impl Default for SoundfontRecord {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            file_path: String::new(),
            file_name: String::new(),
            file_size_bytes: 0,
            instrument_type: UNKNOWN_INSTRUMENT.to_string(),
            quality: Quality::Unknown,
            tags: BTreeSet::new(),
            genre: BTreeSet::new(),
            timbre: None,
            note_range: None,
            polyphony: 0,
            sample_rate: 0,
            bit_depth: 0,
            license: String::new(),
            author: String::new(),
            description: String::new(),
            hash: String::new(),
            last_modified: None,
            date_added: DateTime::<Utc>::default(),
        }
    }
}

impl SoundfontRecord {
    /// A record for `file_path` with name fields derived from the path.
    pub fn new(file_path: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let path = Path::new(&file_path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            file_name,
            file_path,
            ..Self::default()
        }
    }

    pub fn with_instrument_type(mut self, instrument_type: impl Into<String>) -> Self {
        self.instrument_type = instrument_type.into();
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_labels(tags);
        self
    }

    pub fn with_genre<I, S>(mut self, genre: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.genre = normalize_labels(genre);
        self
    }

    pub fn with_timbre(mut self, timbre: Timbre) -> Self {
        self.timbre = Some(timbre);
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.file_size_bytes = bytes;
        self
    }

    /// Re-apply label normalization to every set-valued and vocabulary field.
    pub fn normalize(&mut self) {
        self.tags = normalize_labels(std::mem::take(&mut self.tags));
        self.genre = normalize_labels(std::mem::take(&mut self.genre));
        self.instrument_type = normalize_label(&self.instrument_type)
            .unwrap_or_else(|| UNKNOWN_INSTRUMENT.to_string());
        self.file_path = self.file_path.trim().to_string();
    }

    pub fn size_mb(&self) -> f64 {
        self.file_size_bytes as f64 / CatalogConfig::BYTES_PER_MB
    }

    /// Whether the instrument type carries information.
    pub fn has_known_instrument_type(&self) -> bool {
        !self.instrument_type.is_empty() && self.instrument_type != UNKNOWN_INSTRUMENT
    }

    /// Label of one timbre attribute, if timbre is known.
    pub fn timbre_value(&self, attribute: TimbreAttribute) -> Option<&'static str> {
        self.timbre.as_ref().map(|t| t.value(attribute))
    }

    /// Filesystem location of the soundfont. Relative paths resolve against
    /// `base` when one is given.
    pub fn absolute_path(&self, base: Option<&Path>) -> PathBuf {
        let path = Path::new(&self.file_path);
        match base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

// Older catalogs stored mtime as float seconds since the epoch.
#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampRepr {
    Time(DateTime<Utc>),
    Epoch(f64),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TimestampRepr>::deserialize(deserializer)? {
        Some(TimestampRepr::Time(t)) => Some(t),
        Some(TimestampRepr::Epoch(secs)) if secs > 0.0 => {
            let whole = secs.trunc() as i64;
            let nanos = (secs.fract() * 1e9) as u32;
            Utc.timestamp_opt(whole, nanos).single()
        }
        _ => None,
    })
}

/// Partial manual edit applied through [`CatalogIndex::update`](super::CatalogIndex::update).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordEdit {
    pub name: Option<String>,
    pub instrument_type: Option<String>,
    pub quality: Option<Quality>,
    pub tags: Option<BTreeSet<String>>,
    pub genre: Option<BTreeSet<String>>,
    pub license: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
}

impl RecordEdit {
    pub fn is_empty(&self) -> bool {
        *self == RecordEdit::default()
    }

    /// Apply the edit to `record`. Normalization happens in the index.
    pub fn apply_to(&self, record: &mut SoundfontRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(instrument_type) = &self.instrument_type {
            record.instrument_type = instrument_type.clone();
        }
        if let Some(quality) = self.quality {
            record.quality = quality;
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
        if let Some(genre) = &self.genre {
            record.genre = genre.clone();
        }
        if let Some(license) = &self.license {
            record.license = license.clone();
        }
        if let Some(author) = &self.author {
            record.author = author.clone();
        }
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
    }
}
