//! In-memory catalog index.
//!
//! Records are keyed by id; tag, genre, instrument-type, quality and path
//! lookups are derived from them. All mutation funnels through
//! [`CatalogIndex::apply`], which unindexes the previous version of a record
//! and indexes the new one in the same step.

use super::normalize::normalize_labels;
use super::types::{Quality, RecordEdit, SoundfontRecord, TimbreAttribute};
use crate::error::{FontshelfError, Result};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// First id handed out by an empty index.
pub const FIRST_ID: u64 = 1;

/// Lookup structures derived from the record collection.
///
/// Empty id sets are removed, so two instances built from the same records
/// compare equal regardless of the mutation history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct DerivedIndices {
    pub(super) by_path: HashMap<String, u64>,
    pub(super) by_tag: BTreeMap<String, BTreeSet<u64>>,
    pub(super) by_genre: BTreeMap<String, BTreeSet<u64>>,
    pub(super) by_instrument_type: BTreeMap<String, BTreeSet<u64>>,
    pub(super) by_quality: BTreeMap<Quality, BTreeSet<u64>>,
}

impl DerivedIndices {
    fn from_records<'a>(records: impl IntoIterator<Item = &'a SoundfontRecord>) -> Self {
        let mut derived = Self::default();
        for record in records {
            derived.add(record);
        }
        derived
    }

    fn add(&mut self, record: &SoundfontRecord) {
        let id = record.id;
        self.by_path.insert(record.file_path.clone(), id);
        for tag in &record.tags {
            self.by_tag.entry(tag.clone()).or_default().insert(id);
        }
        for genre in &record.genre {
            self.by_genre.entry(genre.clone()).or_default().insert(id);
        }
        self.by_instrument_type
            .entry(record.instrument_type.clone())
            .or_default()
            .insert(id);
        self.by_quality.entry(record.quality).or_default().insert(id);
    }

    fn remove(&mut self, record: &SoundfontRecord) {
        let id = record.id;
        if self.by_path.get(&record.file_path) == Some(&id) {
            self.by_path.remove(&record.file_path);
        }
        for tag in &record.tags {
            remove_id(&mut self.by_tag, tag, id);
        }
        for genre in &record.genre {
            remove_id(&mut self.by_genre, genre, id);
        }
        remove_id(&mut self.by_instrument_type, &record.instrument_type, id);
        remove_id(&mut self.by_quality, &record.quality, id);
    }
}

fn remove_id<K, Q>(map: &mut BTreeMap<K, BTreeSet<u64>>, key: &Q, id: u64)
where
    K: Ord + std::borrow::Borrow<Q>,
    Q: Ord + ?Sized,
{
    if let Some(ids) = map.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

/// A single mutation of the record collection.
enum RecordChange {
    Upsert(SoundfontRecord),
    Remove(u64),
}

/// The catalog: records plus derived lookups.
///
/// Not meant to be shared across threads; workers that extract metadata in
/// parallel should hand their records back to the owning thread.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    pub(super) records: BTreeMap<u64, SoundfontRecord>,
    pub(super) derived: DerivedIndices,
    next_id: u64,
}

impl Default for CatalogIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            derived: DerivedIndices::default(),
            next_id: FIRST_ID,
        }
    }

    /// Rebuild an index from stored records, keeping their ids.
    ///
    /// Records with a zero, duplicate or out-of-range id get a fresh one. A
    /// record whose path is already present replaces the earlier record for
    /// that path.
    pub fn from_records(records: impl IntoIterator<Item = SoundfontRecord>, next_id: u64) -> Self {
        let mut index = Self::new();
        index.next_id = next_id.max(FIRST_ID);

        let mut pending = Vec::new();
        for mut record in records {
            record.normalize();
            if record.file_path.is_empty() {
                warn!("Skipping stored record {} with empty path", record.id);
                continue;
            }
            // u64::MAX has no successor to store as next_id.
            let Some(after) = record.id.checked_add(1) else {
                warn!("Stored record {} has an out-of-range id, renumbering", record.file_path);
                pending.push(record);
                continue;
            };
            if record.id == 0 || index.records.contains_key(&record.id) {
                pending.push(record);
                continue;
            }
            if let Some(&existing) = index.derived.by_path.get(&record.file_path) {
                warn!(
                    "Duplicate path {} in stored catalog, keeping record {}",
                    record.file_path, record.id
                );
                index.apply(RecordChange::Remove(existing));
            }
            index.next_id = index.next_id.max(after);
            index.apply(RecordChange::Upsert(record));
        }

        for mut record in pending {
            record.id = match index.derived.by_path.get(&record.file_path).copied() {
                Some(existing) => existing,
                None => match index.allocate_id() {
                    Ok(id) => id,
                    Err(e) => {
                        warn!("Dropping stored record {}: {}", record.file_path, e);
                        continue;
                    }
                },
            };
            index.apply(RecordChange::Upsert(record));
        }

        debug!("Restored catalog with {} records", index.len());
        index
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// The only place records and derived lookups change.
    ///
    /// Returns the record previously stored under the affected id.
    fn apply(&mut self, change: RecordChange) -> Option<SoundfontRecord> {
        match change {
            RecordChange::Upsert(record) => {
                let previous = self.records.remove(&record.id);
                if let Some(previous) = &previous {
                    self.derived.remove(previous);
                }
                self.derived.add(&record);
                self.records.insert(record.id, record);
                previous
            }
            RecordChange::Remove(id) => {
                let previous = self.records.remove(&id)?;
                self.derived.remove(&previous);
                Some(previous)
            }
        }
    }

    fn allocate_id(&mut self) -> Result<u64> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| FontshelfError::validation("id", "no soundfont ids left to assign"))?;
        Ok(id)
    }

    /// Insert a record, or replace the one already stored for its path.
    ///
    /// A replacement keeps the existing id. It also keeps `date_added` unless
    /// `force` is set, in which case the record counts as newly added.
    pub fn insert_or_update(&mut self, mut record: SoundfontRecord, force: bool) -> Result<u64> {
        record.normalize();
        if record.file_path.is_empty() {
            return Err(FontshelfError::validation(
                "file_path",
                "a soundfont record needs a file path",
            ));
        }

        let existing = self
            .derived
            .by_path
            .get(&record.file_path)
            .and_then(|id| self.records.get(id))
            .map(|r| (r.id, r.date_added));

        let id = match existing {
            Some((id, date_added)) => {
                record.id = id;
                record.date_added = if force { Utc::now() } else { date_added };
                debug!("Updated soundfont {}: {}", id, record.file_path);
                id
            }
            None => {
                let id = self.allocate_id()?;
                record.id = id;
                record.date_added = Utc::now();
                debug!("Added soundfont {}: {}", id, record.file_path);
                id
            }
        };

        self.apply(RecordChange::Upsert(record));
        Ok(id)
    }

    /// Merge externally sourced records (e.g. a CSV import) by path.
    ///
    /// Paths already in the catalog are skipped unless `update_existing` is
    /// set. Returns how many records were inserted or updated.
    pub fn import_records(
        &mut self,
        records: impl IntoIterator<Item = SoundfontRecord>,
        update_existing: bool,
    ) -> usize {
        let mut merged = 0;
        for record in records {
            if !update_existing && self.by_path(&record.file_path).is_some() {
                debug!("Skipping existing soundfont {}", record.file_path);
                continue;
            }
            match self.insert_or_update(record, false) {
                Ok(_) => merged += 1,
                Err(e) => warn!("Skipping imported record: {}", e),
            }
        }
        merged
    }

    /// Apply a manual edit to an existing record.
    pub fn update(&mut self, id: u64, edit: &RecordEdit) -> Result<u64> {
        let mut record = self.require(id)?.clone();
        edit.apply_to(&mut record);
        record.normalize();
        self.apply(RecordChange::Upsert(record));
        debug!("Edited soundfont {}", id);
        Ok(id)
    }

    /// Remove a record. Returns whether it existed.
    pub fn remove(&mut self, id: u64) -> bool {
        match self.apply(RecordChange::Remove(id)) {
            Some(record) => {
                debug!("Removed soundfont {}: {}", id, record.file_path);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    pub fn get(&self, id: u64) -> Option<&SoundfontRecord> {
        self.records.get(&id)
    }

    /// Like [`get`](Self::get), but a miss is an error.
    pub fn require(&self, id: u64) -> Result<&SoundfontRecord> {
        self.get(id)
            .ok_or(FontshelfError::SoundfontNotFound { id })
    }

    /// All records in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &SoundfontRecord> + '_ {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Id the next inserted record will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn by_path(&self, file_path: &str) -> Option<&SoundfontRecord> {
        self.derived
            .by_path
            .get(file_path.trim())
            .and_then(|id| self.records.get(id))
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&SoundfontRecord> {
        let key = normalize_labels([tag]);
        match key.first() {
            Some(tag) => self.resolve(self.derived.by_tag.get(tag)),
            None => Vec::new(),
        }
    }

    /// Records holding all (`match_all`) or any of the given tags.
    pub fn by_tags<I, S>(&self, tags: I, match_all: bool) -> Vec<&SoundfontRecord>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted = normalize_labels(tags);
        if wanted.is_empty() {
            return Vec::new();
        }

        let mut sets = wanted.iter().map(|t| self.derived.by_tag.get(t));
        let ids: BTreeSet<u64> = if match_all {
            let Some(Some(first)) = sets.next() else {
                return Vec::new();
            };
            let mut acc = first.clone();
            for set in sets {
                match set {
                    Some(set) => acc.retain(|id| set.contains(id)),
                    None => return Vec::new(),
                }
            }
            acc
        } else {
            sets.flatten().flatten().copied().collect()
        };

        ids.iter().filter_map(|id| self.records.get(id)).collect()
    }

    pub fn by_genre(&self, genre: &str) -> Vec<&SoundfontRecord> {
        let key = normalize_labels([genre]);
        match key.first() {
            Some(genre) => self.resolve(self.derived.by_genre.get(genre)),
            None => Vec::new(),
        }
    }

    pub fn by_instrument_type(&self, instrument_type: &str) -> Vec<&SoundfontRecord> {
        let key = normalize_labels([instrument_type]);
        match key.first() {
            Some(kind) => self.resolve(self.derived.by_instrument_type.get(kind)),
            None => Vec::new(),
        }
    }

    pub fn by_quality(&self, quality: Quality) -> Vec<&SoundfontRecord> {
        self.resolve(self.derived.by_quality.get(&quality))
    }

    /// Records whose timbre attribute has the given category label.
    pub fn by_timbre(&self, attribute: TimbreAttribute, value: &str) -> Vec<&SoundfontRecord> {
        let wanted = value.trim().to_lowercase().replace('_', " ");
        self.records
            .values()
            .filter(|r| r.timbre_value(attribute) == Some(wanted.as_str()))
            .collect()
    }

    /// Distinct tags with their record counts.
    pub fn tag_counts(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.derived
            .by_tag
            .iter()
            .map(|(tag, ids)| (tag.as_str(), ids.len()))
    }

    /// Distinct instrument types with their record counts.
    pub fn instrument_type_counts(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.derived
            .by_instrument_type
            .iter()
            .map(|(kind, ids)| (kind.as_str(), ids.len()))
    }

    /// Re-derive every lookup from the records and compare with the live ones.
    pub fn indices_consistent(&self) -> bool {
        let ids_match = self.records.iter().all(|(id, r)| *id == r.id);
        ids_match && DerivedIndices::from_records(self.records.values()) == self.derived
    }

    fn resolve(&self, ids: Option<&BTreeSet<u64>>) -> Vec<&SoundfontRecord> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id))
            .collect()
    }
}
