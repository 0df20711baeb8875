//! Fontshelf Core - headless library for cataloging SF2 soundfonts.
//!
//! The crate owns the soundfont catalog and everything that feeds or queries
//! it: metadata extraction, timbre analysis, search, filtering, similarity
//! recommendations and persistence. It also carries the pieces needed to
//! audition a soundfont: a small MIDI composer and a scoped fluidsynth runner.
//! There is no global state; a [`CatalogIndex`] is created by the caller and
//! passed explicitly.
//!
//! # Example
//!
//! ```rust,no_run
//! use fontshelf_core::{load_catalog, save_catalog, FilterCriteria, Quality};
//! use std::path::Path;
//!
//! fn main() -> fontshelf_core::Result<()> {
//!     let path = Path::new("soundfonts.json");
//!     let catalog = load_catalog(path)?;
//!
//!     let pianos = catalog.filter(
//!         &FilterCriteria::new()
//!             .with_instrument_type("piano")
//!             .with_quality(Quality::High),
//!     );
//!     println!("{} high quality pianos", pianos.len());
//!
//!     if let Some(first) = pianos.first() {
//!         for rec in catalog.similar(first.id, 5)? {
//!             println!("{:.2}  {}", rec.score, rec.record.name);
//!         }
//!     }
//!
//!     save_catalog(path, &catalog)
//! }
//! ```

pub mod analysis;
pub mod cancel;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod error;
pub mod extract;
pub mod library;
pub mod notes;
pub mod persistence;
pub mod synth;

// Re-export commonly used types
pub use analysis::{record_from_extraction, QualityThresholds};
pub use cancel::CancellationToken;
pub use catalog::{
    CatalogIndex, CatalogRng, CatalogStatistics, FilterCriteria, NoteRange, Quality,
    Recommendation, RecordEdit, SearchFields, SearchHit, SimilarityWeights, SoundfontRecord,
    SoundfontSelection, Timbre, TimbreAttribute,
};
pub use compose::{generate, write_midi, write_test_midi, Composition, CompositionRequest, ScaleType, Style};
pub use config::{CatalogConfig, ScanConfig, Settings, SynthConfig};
pub use error::{FontshelfError, Result};
pub use extract::{ExtractOptions, Extraction, ExtractorKind, MetadataExtractor};
pub use library::{LibraryScanner, RecordReviewer, ScanMode, ScanObserver, ScanOptions, ScanReport};
pub use persistence::{export_csv, import_csv, load_catalog, save_catalog};
pub use synth::{PlayOptions, SynthRunner};
