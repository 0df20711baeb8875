//! Weighted similarity between soundfonts.
//!
//! Each factor contributes at most its weight:
//! - instrument type: full weight on an equal, known type
//! - tags and genre: weight times Jaccard overlap
//! - timbre: weight scaled down by the summed rank distance
//! - quality: full weight on an equal known quality, a fraction when adjacent

use super::index::CatalogIndex;
use super::types::{SoundfontRecord, Timbre};
use crate::error::{FontshelfError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Factor weights for [`CatalogIndex::similar`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub instrument_type: f64,
    pub tags: f64,
    pub genre: f64,
    pub timbre: f64,
    pub quality: f64,
    /// Fraction of the quality weight awarded for a one-step difference.
    pub adjacent_quality_factor: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            instrument_type: 0.3,
            tags: 0.25,
            genre: 0.15,
            timbre: 0.2,
            quality: 0.1,
            adjacent_quality_factor: 0.5,
        }
    }
}

impl SimilarityWeights {
    pub const FACTOR_NAMES: [&'static str; 6] = [
        "instrument_type",
        "tags",
        "genre",
        "timbre",
        "quality",
        "adjacent_quality_factor",
    ];

    /// Set one factor by name. Accepts `-` in place of `_`.
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let slot = match name.trim().replace('-', "_").as_str() {
            "instrument_type" | "type" => &mut self.instrument_type,
            "tags" => &mut self.tags,
            "genre" => &mut self.genre,
            "timbre" => &mut self.timbre,
            "quality" => &mut self.quality,
            "adjacent_quality_factor" | "adjacent" => &mut self.adjacent_quality_factor,
            other => {
                return Err(FontshelfError::validation(
                    "similarity",
                    format!(
                        "unknown factor '{}', expected one of {}",
                        other,
                        Self::FACTOR_NAMES.join(", ")
                    ),
                ))
            }
        };
        *slot = value;
        self.validate()
    }

    /// Weights must be finite and non-negative; the adjacent factor is a fraction.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            self.instrument_type,
            self.tags,
            self.genre,
            self.timbre,
            self.quality,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FontshelfError::Config {
                message: format!("similarity weights must be non-negative numbers: {:?}", self),
            });
        }
        if !(0.0..=1.0).contains(&self.adjacent_quality_factor) {
            return Err(FontshelfError::Config {
                message: format!(
                    "adjacent_quality_factor must be within 0..=1, got {}",
                    self.adjacent_quality_factor
                ),
            });
        }
        Ok(())
    }

    /// Score `candidate` against `source`.
    pub fn score(&self, source: &SoundfontRecord, candidate: &SoundfontRecord) -> f64 {
        let mut score = 0.0;

        if source.has_known_instrument_type() && source.instrument_type == candidate.instrument_type
        {
            score += self.instrument_type;
        }

        score += self.tags * jaccard(&source.tags, &candidate.tags);
        score += self.genre * jaccard(&source.genre, &candidate.genre);

        if let (Some(a), Some(b)) = (&source.timbre, &candidate.timbre) {
            score += self.timbre * timbre_closeness(a, b);
        }

        if let (Some(a), Some(b)) = (source.quality.rank(), candidate.quality.rank()) {
            match a.abs_diff(b) {
                0 => score += self.quality,
                1 => score += self.quality * self.adjacent_quality_factor,
                _ => {}
            }
        }

        score
    }
}

/// Parse `"tags=0.3,genre=0.1"`; unnamed factors keep their defaults.
impl FromStr for SimilarityWeights {
    type Err = FontshelfError;

    fn from_str(s: &str) -> Result<Self> {
        let mut weights = Self::default();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                FontshelfError::validation("similarity", format!("expected name=value, got '{pair}'"))
            })?;
            let value: f64 = value.trim().parse().map_err(|_| {
                FontshelfError::validation("similarity", format!("'{value}' is not a number"))
            })?;
            weights.set(name, value)?;
        }
        Ok(weights)
    }
}

/// `|A ∩ B| / |A ∪ B|`, or 0 when both are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn timbre_closeness(a: &Timbre, b: &Timbre) -> f64 {
    let max = f64::from(Timbre::max_rank_distance());
    1.0 - f64::from(a.rank_distance(b)) / max
}

/// A recommended soundfont and its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendation<'a> {
    pub record: &'a SoundfontRecord,
    pub score: f64,
}

impl CatalogIndex {
    /// The `limit` records most similar to `id` under default weights.
    pub fn similar(&self, id: u64, limit: usize) -> Result<Vec<Recommendation<'_>>> {
        self.similar_with(id, limit, &SimilarityWeights::default())
    }

    /// The `limit` records most similar to `id`, best first.
    ///
    /// The source record is excluded. Equal scores are ordered by id.
    pub fn similar_with(
        &self,
        id: u64,
        limit: usize,
        weights: &SimilarityWeights,
    ) -> Result<Vec<Recommendation<'_>>> {
        let source = self.require(id)?;

        let mut ranked: Vec<Recommendation<'_>> = self
            .all()
            .filter(|candidate| candidate.id != id)
            .map(|record| Recommendation {
                record,
                score: weights.score(source, record),
            })
            .collect();

        ranked.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.record.id.cmp(&b.record.id),
            other => other,
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::{Attack, Brightness, HarmonicQuality, Quality, Richness};

    fn labels(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard(&labels(&[]), &labels(&[])), 0.0);
        assert_eq!(jaccard(&labels(&["a"]), &labels(&["a"])), 1.0);
        assert!((jaccard(&labels(&["a", "b"]), &labels(&["b", "c"])) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_type_and_quality_never_match() {
        let weights = SimilarityWeights::default();
        let a = SoundfontRecord::new("a.sf2");
        let b = SoundfontRecord::new("b.sf2");
        assert_eq!(weights.score(&a, &b), 0.0);
    }

    #[test]
    fn test_quality_adjacency() {
        let weights = SimilarityWeights::default();
        let high = SoundfontRecord::new("a.sf2").with_quality(Quality::High);
        let medium = SoundfontRecord::new("b.sf2").with_quality(Quality::Medium);
        let low = SoundfontRecord::new("c.sf2").with_quality(Quality::Low);

        assert!((weights.score(&high, &high) - 0.1).abs() < 1e-12);
        assert!((weights.score(&high, &medium) - 0.05).abs() < 1e-12);
        assert_eq!(weights.score(&high, &low), 0.0);
    }

    #[test]
    fn test_timbre_closeness() {
        let weights = SimilarityWeights::default();
        let near = Timbre::new(Brightness::Dark, Richness::Simple, Attack::Soft, HarmonicQuality::Percussive);
        let far = Timbre::new(
            Brightness::VeryBright,
            Richness::VeryRich,
            Attack::Aggressive,
            HarmonicQuality::VeryHarmonic,
        );
        let a = SoundfontRecord::new("a.sf2").with_timbre(near.clone());
        let b = SoundfontRecord::new("b.sf2").with_timbre(near);
        let c = SoundfontRecord::new("c.sf2").with_timbre(far);

        assert!((weights.score(&a, &b) - 0.2).abs() < 1e-12);
        assert_eq!(weights.score(&a, &c), 0.0);
    }

    #[test]
    fn test_similar_excludes_source_and_orders() {
        let mut index = CatalogIndex::new();
        let piano = |path: &str, tags: &[&str]| {
            SoundfontRecord::new(path)
                .with_instrument_type("piano")
                .with_quality(Quality::High)
                .with_tags(tags)
        };
        let a = index.insert_or_update(piano("a.sf2", &["piano", "bright"]), false).unwrap();
        let b = index.insert_or_update(piano("b.sf2", &["piano"]), false).unwrap();
        let c = index
            .insert_or_update(
                SoundfontRecord::new("c.sf2").with_instrument_type("drums").with_quality(Quality::Low),
                false,
            )
            .unwrap();

        let results = index.similar(a, 10).unwrap();
        let ids: Vec<u64> = results.iter().map(|r| r.record.id).collect();
        assert_eq!(ids, vec![b, c]);
        assert!(results[0].score > results[1].score);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        assert_eq!(index.similar(a, 1).unwrap().len(), 1);
        assert!(index.similar(a, 0).unwrap().is_empty());
    }

    #[test]
    fn test_similar_unknown_id() {
        let index = CatalogIndex::new();
        assert!(matches!(
            index.similar(4, 5),
            Err(FontshelfError::SoundfontNotFound { id: 4 })
        ));
    }

    #[test]
    fn test_weights_from_str_and_set() {
        let weights: SimilarityWeights = "tags=0.5, genre=0".parse().unwrap();
        assert_eq!(weights.tags, 0.5);
        assert_eq!(weights.genre, 0.0);
        assert_eq!(weights.timbre, SimilarityWeights::default().timbre);

        assert!("bogus=1".parse::<SimilarityWeights>().is_err());
        assert!("tags".parse::<SimilarityWeights>().is_err());
        assert!("tags=-1".parse::<SimilarityWeights>().is_err());
        assert!("adjacent=2".parse::<SimilarityWeights>().is_err());

        let mut weights = SimilarityWeights::default();
        weights.set("instrument-type", 1.0).unwrap();
        assert_eq!(weights.instrument_type, 1.0);
    }

    #[test]
    fn test_weights_deserialize_partial() {
        let weights: SimilarityWeights = serde_json::from_str(r#"{"timbre": 0.4}"#).unwrap();
        assert_eq!(weights.timbre, 0.4);
        assert_eq!(weights.tags, 0.25);
    }
}
