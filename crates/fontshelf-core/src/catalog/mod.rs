//! Soundfont catalog: records, the index and the engines that query it.

mod index;
mod normalize;
mod search;
mod similarity;
mod stats;
pub mod types;

pub use index::{CatalogIndex, FIRST_ID};
pub use normalize::{join_labels, normalize_label, normalize_labels, split_labels};
pub use search::{CatalogRng, FilterCriteria, SearchFields, SearchHit, SoundfontSelection};
pub use similarity::{jaccard, Recommendation, SimilarityWeights};
pub use stats::{CatalogStatistics, LabelCount};
pub use types::{
    Attack, Brightness, HarmonicQuality, NoteRange, Quality, RecordEdit, Richness,
    SoundfontRecord, Timbre, TimbreAttribute, TimbreFeatures, UNKNOWN_INSTRUMENT,
};
