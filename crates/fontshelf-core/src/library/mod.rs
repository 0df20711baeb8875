//! Bringing soundfonts on disk into a catalog.

mod scanner;

pub use scanner::{
    LibraryScanner, NoopObserver, RecordReviewer, ScanMode, ScanObserver, ScanOptions,
    ScanProgress, ScanReport,
};
