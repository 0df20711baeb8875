//! Catalog summary statistics.

use super::index::CatalogIndex;
use crate::config::CatalogConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A label and how many records carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Aggregate view of a catalog.
///
/// Count lists are sorted by count, highest first, then by label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogStatistics {
    pub total: usize,
    pub instrument_types: Vec<LabelCount>,
    pub qualities: Vec<LabelCount>,
    pub genres: Vec<LabelCount>,
    pub tags: Vec<LabelCount>,
    pub authors: Vec<LabelCount>,
    pub total_size_bytes: u64,
    pub average_size_bytes: f64,
}

impl CatalogStatistics {
    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / CatalogConfig::BYTES_PER_MB
    }

    pub fn average_size_mb(&self) -> f64 {
        self.average_size_bytes / CatalogConfig::BYTES_PER_MB
    }
}

fn sorted_counts(counts: HashMap<String, usize>) -> Vec<LabelCount> {
    let mut counts: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    counts
}

impl CatalogIndex {
    pub fn statistics(&self) -> CatalogStatistics {
        let mut types = HashMap::new();
        let mut qualities = HashMap::new();
        let mut genres = HashMap::new();
        let mut tags = HashMap::new();
        let mut authors = HashMap::new();
        let mut total_size_bytes = 0u64;

        for record in self.all() {
            *types.entry(record.instrument_type.clone()).or_insert(0) += 1;
            *qualities.entry(record.quality.to_string()).or_insert(0) += 1;
            for genre in &record.genre {
                *genres.entry(genre.clone()).or_insert(0) += 1;
            }
            for tag in &record.tags {
                *tags.entry(tag.clone()).or_insert(0) += 1;
            }
            let author = record.author.trim();
            if !author.is_empty() {
                *authors.entry(author.to_string()).or_insert(0) += 1;
            }
            total_size_bytes += record.file_size_bytes;
        }

        let total = self.len();
        let average_size_bytes = if total == 0 {
            0.0
        } else {
            total_size_bytes as f64 / total as f64
        };

        CatalogStatistics {
            total,
            instrument_types: sorted_counts(types),
            qualities: sorted_counts(qualities),
            genres: sorted_counts(genres),
            tags: sorted_counts(tags),
            authors: sorted_counts(authors),
            total_size_bytes,
            average_size_bytes,
        }
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, title: &str, counts: &[LabelCount]) -> fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(f, "{title}:")?;
    for entry in counts {
        writeln!(f, "  {:<20} {}", entry.label, entry.count)?;
    }
    Ok(())
}

impl fmt::Display for CatalogStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total soundfonts: {}", self.total)?;
        writeln!(
            f,
            "Total size: {:.2} MB (average {:.2} MB)",
            self.total_size_mb(),
            self.average_size_mb()
        )?;
        write_section(f, "Instrument types", &self.instrument_types)?;
        write_section(f, "Quality", &self.qualities)?;
        write_section(f, "Genres", &self.genres)?;
        write_section(f, "Tags", &self.tags)?;
        write_section(f, "Authors", &self.authors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::{Quality, SoundfontRecord};

    #[test]
    fn test_empty_statistics() {
        let stats = CatalogIndex::new().statistics();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_size_bytes, 0.0);
        assert!(stats.tags.is_empty());
    }

    #[test]
    fn test_counts_sorted_by_count_then_label() {
        let mut index = CatalogIndex::new();
        let rows = [
            ("a.sf2", "piano", Quality::High, 1024 * 1024),
            ("b.sf2", "strings", Quality::High, 3 * 1024 * 1024),
            ("c.sf2", "piano", Quality::Low, 2 * 1024 * 1024),
        ];
        for (path, kind, quality, size) in rows {
            let mut record = SoundfontRecord::new(path)
                .with_instrument_type(kind)
                .with_quality(quality)
                .with_tags(["shared"])
                .with_size(size);
            record.author = "Someone".into();
            index.insert_or_update(record, false).unwrap();
        }

        let stats = index.statistics();
        assert_eq!(stats.total, 3);
        assert_eq!(
            stats.instrument_types,
            vec![
                LabelCount { label: "piano".into(), count: 2 },
                LabelCount { label: "strings".into(), count: 1 },
            ]
        );
        assert_eq!(stats.qualities[0].label, "high");
        assert_eq!(stats.tags[0].count, 3);
        assert_eq!(stats.authors[0].count, 3);
        assert_eq!(stats.total_size_mb(), 6.0);
        assert_eq!(stats.average_size_mb(), 2.0);

        let rendered = stats.to_string();
        assert!(rendered.contains("Total soundfonts: 3"));
        assert!(rendered.contains("piano"));
    }
}
