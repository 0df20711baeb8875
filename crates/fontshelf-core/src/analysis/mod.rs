//! Sound analysis and annotation heuristics.
//!
//! - `render`: offline rendering of test phrases through `rustysynth`
//! - `timbre`: spectral features and their timbre categories
//! - `suggest`: instrument type, quality, genre and tag suggestions

pub mod render;
mod suggest;
mod timbre;

pub use render::{load_soundfont, rms, test_phrase, OfflineRenderer, TestNote};
pub use suggest::{
    default_note_range, estimate_polyphony, infer_instrument_type, infer_soundfont_type,
    record_from_extraction, suggest_genres, suggest_quality, suggest_tags, QualityThresholds,
    MULTI_INSTRUMENT,
};
pub use timbre::{analyze_soundfont, classify, zero_crossing_rate, SpectralAnalyzer};
