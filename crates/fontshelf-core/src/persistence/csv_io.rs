//! CSV export and import of catalog records.
//!
//! One row per record with a header. Set-valued fields are joined with the
//! catalog list delimiter, notes are written as names and timestamps as
//! RFC 3339 with full sub-second precision. The raw spectral features of an
//! analyzed timbre follow its four categories and stay empty when absent.

use super::atomic::write_file_atomic;
use crate::catalog::{
    join_labels, split_labels, NoteRange, Quality, SoundfontRecord, Timbre, TimbreFeatures,
};
use crate::config::CatalogConfig;
use crate::error::{FontshelfError, Result};
use crate::notes::{note_name, parse_note_name};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Column layout. Field order is the header order.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    id: u64,
    name: String,
    file_path: String,
    file_name: String,
    file_size_bytes: u64,
    instrument_type: String,
    quality: String,
    tags: String,
    genre: String,
    brightness: String,
    richness: String,
    attack: String,
    harmonic_quality: String,
    spectral_centroid: String,
    spectral_bandwidth: String,
    spectral_rolloff: String,
    zero_crossing_rate: String,
    harmonic_ratio: String,
    min_note: String,
    max_note: String,
    missing_notes: String,
    polyphony: u32,
    sample_rate: u32,
    bit_depth: u16,
    license: String,
    author: String,
    description: String,
    hash: String,
    last_modified: String,
    date_added: String,
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_time(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| FontshelfError::validation(field, format!("invalid timestamp '{raw}': {e}")))
}

fn format_feature(features: Option<&TimbreFeatures>, pick: fn(&TimbreFeatures) -> f32) -> String {
    features.map(|f| pick(f).to_string()).unwrap_or_default()
}

/// All five feature columns or none of them.
fn parse_features(row: &CsvRow) -> Result<Option<TimbreFeatures>> {
    let columns = [
        ("spectral_centroid", &row.spectral_centroid),
        ("spectral_bandwidth", &row.spectral_bandwidth),
        ("spectral_rolloff", &row.spectral_rolloff),
        ("zero_crossing_rate", &row.zero_crossing_rate),
        ("harmonic_ratio", &row.harmonic_ratio),
    ];
    if columns.iter().all(|(_, raw)| raw.trim().is_empty()) {
        return Ok(None);
    }

    let mut values = [0.0f32; 5];
    for (value, (field, raw)) in values.iter_mut().zip(columns) {
        *value = raw
            .trim()
            .parse()
            .map_err(|_| FontshelfError::validation(field, format!("invalid number '{raw}'")))?;
    }
    let [spectral_centroid, spectral_bandwidth, spectral_rolloff, zero_crossing_rate, harmonic_ratio] =
        values;
    Ok(Some(TimbreFeatures {
        spectral_centroid,
        spectral_bandwidth,
        spectral_rolloff,
        zero_crossing_rate,
        harmonic_ratio,
    }))
}

fn delimiter() -> String {
    CatalogConfig::LIST_DELIMITER.to_string()
}

impl From<&SoundfontRecord> for CsvRow {
    fn from(record: &SoundfontRecord) -> Self {
        let timbre = record.timbre.as_ref();
        let features = timbre.and_then(|t| t.features.as_ref());
        let range = record.note_range.as_ref();
        Self {
            id: record.id,
            name: record.name.clone(),
            file_path: record.file_path.clone(),
            file_name: record.file_name.clone(),
            file_size_bytes: record.file_size_bytes,
            instrument_type: record.instrument_type.clone(),
            quality: record.quality.to_string(),
            tags: join_labels(&record.tags),
            genre: join_labels(&record.genre),
            brightness: timbre.map(|t| t.brightness.to_string()).unwrap_or_default(),
            richness: timbre.map(|t| t.richness.to_string()).unwrap_or_default(),
            attack: timbre.map(|t| t.attack.to_string()).unwrap_or_default(),
            harmonic_quality: timbre
                .map(|t| t.harmonic_quality.to_string())
                .unwrap_or_default(),
            spectral_centroid: format_feature(features, |f| f.spectral_centroid),
            spectral_bandwidth: format_feature(features, |f| f.spectral_bandwidth),
            spectral_rolloff: format_feature(features, |f| f.spectral_rolloff),
            zero_crossing_rate: format_feature(features, |f| f.zero_crossing_rate),
            harmonic_ratio: format_feature(features, |f| f.harmonic_ratio),
            min_note: range.map(NoteRange::lowest_name).unwrap_or_default(),
            max_note: range.map(NoteRange::highest_name).unwrap_or_default(),
            missing_notes: range
                .map(|r| r.missing.iter().map(|n| note_name(*n)).collect::<Vec<_>>())
                .unwrap_or_default()
                .join(&delimiter()),
            polyphony: record.polyphony,
            sample_rate: record.sample_rate,
            bit_depth: record.bit_depth,
            license: record.license.clone(),
            author: record.author.clone(),
            description: record.description.clone(),
            hash: record.hash.clone(),
            last_modified: record.last_modified.as_ref().map(format_time).unwrap_or_default(),
            date_added: format_time(&record.date_added),
        }
    }
}

impl TryFrom<CsvRow> for SoundfontRecord {
    type Error = FontshelfError;

    fn try_from(row: CsvRow) -> Result<Self> {
        let timbre_fields = [&row.brightness, &row.richness, &row.attack, &row.harmonic_quality];
        let timbre = if timbre_fields.iter().all(|f| f.trim().is_empty()) {
            None
        } else {
            let mut timbre = Timbre::new(
                row.brightness.parse()?,
                row.richness.parse()?,
                row.attack.parse()?,
                row.harmonic_quality.parse()?,
            );
            timbre.features = parse_features(&row)?;
            Some(timbre)
        };

        let note_range = if row.min_note.trim().is_empty() || row.max_note.trim().is_empty() {
            None
        } else {
            let missing = row
                .missing_notes
                .split(CatalogConfig::LIST_DELIMITER)
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(parse_note_name)
                .collect::<Result<Vec<u8>>>()?;
            Some(NoteRange::new(
                parse_note_name(&row.min_note)?,
                parse_note_name(&row.max_note)?,
                missing,
            ))
        };

        let last_modified = match row.last_modified.trim() {
            "" => None,
            raw => Some(parse_time(raw, "last_modified")?),
        };

        let mut record = SoundfontRecord {
            id: row.id,
            name: row.name,
            file_path: row.file_path,
            file_name: row.file_name,
            file_size_bytes: row.file_size_bytes,
            instrument_type: row.instrument_type,
            quality: Quality::from_str_lossy(&row.quality),
            tags: split_labels(&row.tags),
            genre: split_labels(&row.genre),
            timbre,
            note_range,
            polyphony: row.polyphony,
            sample_rate: row.sample_rate,
            bit_depth: row.bit_depth,
            license: row.license,
            author: row.author,
            description: row.description,
            hash: row.hash,
            last_modified,
            date_added: parse_time(&row.date_added, "date_added")?,
        };
        record.normalize();
        Ok(record)
    }
}

/// Write records as CSV to any writer.
pub fn write_csv<'a, W: Write>(
    writer: W,
    records: impl IntoIterator<Item = &'a SoundfontRecord>,
) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut count = 0;
    for record in records {
        csv_writer.serialize(CsvRow::from(record))?;
        count += 1;
    }
    csv_writer.flush()?;
    Ok(count)
}

/// Read records from CSV produced by [`write_csv`].
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<SoundfontRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (line, row) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let record = SoundfontRecord::try_from(row).map_err(|e| FontshelfError::Csv {
            message: format!("row {}: {}", line + 1, e),
            source: None,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Export records to a CSV file, replacing it atomically.
pub fn export_csv<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a SoundfontRecord>,
) -> Result<usize> {
    let mut buffer = Vec::new();
    let count = write_csv(&mut buffer, records)?;
    write_file_atomic(path, &buffer, false)?;
    info!("Exported {} soundfonts to {}", count, path.display());
    Ok(count)
}

/// Import every record from a CSV file.
pub fn import_csv(path: &Path) -> Result<Vec<SoundfontRecord>> {
    if !path.is_file() {
        return Err(FontshelfError::FileNotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|e| FontshelfError::io_with_path(e, path))?;
    let records = read_csv(file)?;
    debug!("Read {} rows from {}", records.len(), path.display());
    Ok(records)
}
