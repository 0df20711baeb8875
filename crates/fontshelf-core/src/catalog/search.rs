//! Text search, predicate filtering and random selection over the catalog.

use super::index::CatalogIndex;
use super::normalize::{normalize_label, normalize_labels};
use super::types::{Quality, SoundfontRecord};
use crate::error::{FontshelfError, Result};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::BTreeSet;

/// Which record fields a text search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchFields {
    pub file_name: bool,
    pub tags: bool,
    pub genre: bool,
    pub instrument_type: bool,
    pub name: bool,
    pub author: bool,
    pub description: bool,
}

impl Default for SearchFields {
    fn default() -> Self {
        Self {
            file_name: true,
            tags: true,
            genre: true,
            instrument_type: true,
            name: false,
            author: false,
            description: false,
        }
    }
}

impl SearchFields {
    /// Default fields plus name, author and description.
    pub fn extended() -> Self {
        Self {
            name: true,
            author: true,
            description: true,
            ..Self::default()
        }
    }
}

/// A search result. `score` is the number of fields matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit<'a> {
    pub record: &'a SoundfontRecord,
    pub score: usize,
}

/// Conjunctive filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub quality: Option<Quality>,
    /// Minimum known quality; unknown-quality records never pass.
    pub min_quality: Option<Quality>,
    pub instrument_type: Option<String>,
    /// The record's tags must include all of these.
    pub tags: BTreeSet<String>,
    /// The record's genres must include all of these.
    pub genre: BTreeSet<String>,
    pub author: Option<String>,
    /// Inclusive, in bytes.
    pub min_size: Option<u64>,
    /// Inclusive, in bytes.
    pub max_size: Option<u64>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_min_quality(mut self, quality: Quality) -> Self {
        self.min_quality = Some(quality);
        self
    }

    pub fn with_instrument_type(mut self, instrument_type: impl Into<String>) -> Self {
        self.instrument_type = Some(instrument_type.into());
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

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_size_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_size = min;
        self.max_size = max;
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copy with every label normalized the way stored records are.
    fn normalized(&self) -> Self {
        Self {
            instrument_type: self
                .instrument_type
                .as_deref()
                .map(|t| normalize_label(t).unwrap_or_default()),
            tags: normalize_labels(&self.tags),
            genre: normalize_labels(&self.genre),
            author: self.author.as_ref().map(|a| a.trim().to_lowercase()),
            ..self.clone()
        }
    }

    /// Whether `record` passes. Expects `self` to be normalized.
    fn accepts(&self, record: &SoundfontRecord) -> bool {
        if self.quality.is_some_and(|q| record.quality != q) {
            return false;
        }
        if let Some(min) = self.min_quality.and_then(|q| q.rank()) {
            if !record.quality.rank().is_some_and(|rank| rank >= min) {
                return false;
            }
        }
        if self
            .instrument_type
            .as_ref()
            .is_some_and(|t| record.instrument_type != *t)
        {
            return false;
        }
        if !self.tags.is_subset(&record.tags) || !self.genre.is_subset(&record.genre) {
            return false;
        }
        if self
            .author
            .as_ref()
            .is_some_and(|a| record.author.trim().to_lowercase() != *a)
        {
            return false;
        }
        if self.min_size.is_some_and(|min| record.file_size_bytes < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| record.file_size_bytes > max) {
            return false;
        }
        true
    }
}

/// How a caller picks the soundfont to play a composition with.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundfontSelection {
    Id(u64),
    Matching(FilterCriteria),
}

/// Random source for catalog draws and composition.
///
/// Seeded instances give reproducible results.
#[derive(Debug, Clone)]
pub struct CatalogRng(StdRng);

impl CatalogRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self(StdRng::from_os_rng())
    }

    /// Seeded when `seed` is given, otherwise from OS entropy.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }
}

impl RngCore for CatalogRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl CatalogIndex {
    /// Rank records against a whitespace-separated query over the default fields.
    pub fn search(&self, query: &str) -> Vec<SearchHit<'_>> {
        self.search_fields(query, SearchFields::default())
    }

    /// Rank records against a query over the chosen fields.
    ///
    /// A field counts once if any query term occurs in it, case-insensitively.
    /// Records that match nothing are dropped; an empty query returns every
    /// record with score 0. Ties keep ascending id order.
    pub fn search_fields(&self, query: &str, fields: SearchFields) -> Vec<SearchHit<'_>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return self
                .all()
                .map(|record| SearchHit { record, score: 0 })
                .collect();
        }

        let any_term = |text: &str| terms.iter().any(|t| contains_ci(text, t));
        let any_label = |labels: &BTreeSet<String>| labels.iter().any(|l| any_term(l));

        let mut hits: Vec<SearchHit<'_>> = self
            .all()
            .filter_map(|record| {
                let matched = [
                    fields.file_name && any_term(&record.file_name),
                    fields.tags && any_label(&record.tags),
                    fields.genre && any_label(&record.genre),
                    fields.instrument_type && any_term(&record.instrument_type),
                    fields.name && any_term(&record.name),
                    fields.author && any_term(&record.author),
                    fields.description && any_term(&record.description),
                ];
                let score = matched.iter().filter(|m| **m).count();
                (score > 0).then_some(SearchHit { record, score })
            })
            .collect();

        // Stable sort keeps id order within a score.
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits
    }

    /// Records satisfying every predicate in `criteria`, in id order.
    pub fn filter(&self, criteria: &FilterCriteria) -> Vec<&SoundfontRecord> {
        let criteria = criteria.normalized();
        self.all().filter(|r| criteria.accepts(r)).collect()
    }

    /// Uniform draw among records passing `criteria` (all records if `None`).
    pub fn random(
        &self,
        criteria: Option<&FilterCriteria>,
        rng: &mut CatalogRng,
    ) -> Option<&SoundfontRecord> {
        let candidates = match criteria {
            Some(criteria) => self.filter(criteria),
            None => self.all().collect(),
        };
        if candidates.is_empty() {
            return None;
        }
        let pick = rng.random_range(0..candidates.len());
        Some(candidates[pick])
    }

    /// Resolve the soundfont a composition should be played with.
    pub fn select_for_playback(
        &self,
        selection: &SoundfontSelection,
        rng: &mut CatalogRng,
    ) -> Result<&SoundfontRecord> {
        match selection {
            SoundfontSelection::Id(id) => self.require(*id),
            SoundfontSelection::Matching(criteria) => {
                self.random(Some(criteria), rng).ok_or_else(|| {
                    FontshelfError::validation(
                        "criteria",
                        "no soundfont in the catalog matches the selection",
                    )
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CatalogIndex {
        let mut index = CatalogIndex::new();
        let rows = [
            ("/sf/GrandPiano.sf2", "piano", Quality::High, vec!["piano", "bright"], 40_000_000),
            ("/sf/Strings.sf2", "strings", Quality::Medium, vec!["warm", "piano"], 12_000_000),
            ("/sf/Kit.sf2", "drums", Quality::Low, vec!["drum"], 2_000_000),
            ("/sf/Mystery.sf2", "unknown", Quality::Unknown, vec![], 500),
        ];
        for (path, kind, quality, tags, size) in rows {
            let record = SoundfontRecord::new(path)
                .with_instrument_type(kind)
                .with_quality(quality)
                .with_tags(tags)
                .with_size(size);
            index.insert_or_update(record, false).unwrap();
        }
        index
    }

    fn ids<'a>(records: impl IntoIterator<Item = &'a SoundfontRecord>) -> Vec<u64> {
        records.into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_search_scores_matched_fields() {
        let index = catalog();
        let hits = index.search("piano");

        // GrandPiano matches file name, tags and type; Strings only its tags.
        assert_eq!(hits.len(), 2);
        assert_eq!((hits[0].record.id, hits[0].score), (1, 3));
        assert_eq!((hits[1].record.id, hits[1].score), (2, 1));
    }

    #[test]
    fn test_search_is_case_insensitive_and_multi_term() {
        let index = catalog();
        let hits = index.search("KIT warm");
        assert_eq!(ids(hits.iter().map(|h| h.record)), vec![2, 3]);
        assert!(hits.iter().all(|h| h.score == 1));
    }

    #[test]
    fn test_empty_query_returns_everything() {
        let index = catalog();
        let hits = index.search("   ");
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().all(|h| h.score == 0));
    }

    #[test]
    fn test_extended_fields() {
        let mut index = catalog();
        let mut record = SoundfontRecord::new("/sf/Other.sf2");
        record.author = "Frank Wen".into();
        index.insert_or_update(record, false).unwrap();

        assert!(index.search("wen").is_empty());
        let hits = index.search_fields("wen", SearchFields::extended());
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_filter_tag_superset() {
        let index = catalog();
        let criteria = FilterCriteria::new().with_tags(["Piano"]);
        assert_eq!(ids(index.filter(&criteria)), vec![1, 2]);

        let criteria = FilterCriteria::new().with_tags(["piano", "bright"]);
        assert_eq!(ids(index.filter(&criteria)), vec![1]);
    }

    #[test]
    fn test_filter_combines_predicates() {
        let index = catalog();
        let criteria = FilterCriteria::new()
            .with_instrument_type("Strings")
            .with_quality(Quality::Medium);
        assert_eq!(ids(index.filter(&criteria)), vec![2]);

        let criteria = FilterCriteria::new().with_min_quality(Quality::Medium);
        assert_eq!(ids(index.filter(&criteria)), vec![1, 2]);

        let criteria = FilterCriteria::new().with_size_range(Some(2_000_000), Some(12_000_000));
        assert_eq!(ids(index.filter(&criteria)), vec![2, 3]);

        assert_eq!(index.filter(&FilterCriteria::new()).len(), 4);
    }

    #[test]
    fn test_seeded_random_is_deterministic() {
        let index = catalog();
        let draw = |seed| {
            let mut rng = CatalogRng::seeded(seed);
            (0..8)
                .map(|_| index.random(None, &mut rng).unwrap().id)
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(7), draw(7));
    }

    #[test]
    fn test_random_respects_criteria() {
        let index = catalog();
        let mut rng = CatalogRng::seeded(1);
        let criteria = FilterCriteria::new().with_instrument_type("drums");
        for _ in 0..10 {
            assert_eq!(index.random(Some(&criteria), &mut rng).unwrap().id, 3);
        }

        let none = FilterCriteria::new().with_tags(["nothing"]);
        assert!(index.random(Some(&none), &mut rng).is_none());
        assert!(CatalogIndex::new().random(None, &mut rng).is_none());
    }

    #[test]
    fn test_select_for_playback() {
        let index = catalog();
        let mut rng = CatalogRng::seeded(3);

        let picked = index
            .select_for_playback(&SoundfontSelection::Id(2), &mut rng)
            .unwrap();
        assert_eq!(picked.id, 2);

        let err = index
            .select_for_playback(&SoundfontSelection::Id(99), &mut rng)
            .unwrap_err();
        assert!(err.is_not_found());

        let criteria = FilterCriteria::new().with_quality(Quality::High);
        let picked = index
            .select_for_playback(&SoundfontSelection::Matching(criteria), &mut rng)
            .unwrap();
        assert_eq!(picked.id, 1);
    }
}
