//! Filesystem-only extraction.

use super::hashing::compute_sha256;
use super::{ExtractOptions, Extraction, FileFacts, MetadataExtractor};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Gather name, size, mtime and (optionally) the hash of `path`.
///
/// Each fact is independent; a failure is recorded as a warning on
/// `extraction` and the fact is left empty.
pub(super) fn collect_file_facts(path: &Path, options: &ExtractOptions, extraction: &mut Extraction) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut facts = FileFacts {
        file_name,
        ..FileFacts::default()
    };

    match std::fs::metadata(path) {
        Ok(metadata) => {
            facts.file_size_bytes = metadata.len();
            match metadata.modified() {
                Ok(modified) => facts.last_modified = Some(DateTime::<Utc>::from(modified)),
                Err(e) => extraction.warn(format!("modification time unavailable: {e}")),
            }
        }
        Err(e) => extraction.warn(format!("failed to stat file: {e}")),
    }

    if options.compute_hash {
        match compute_sha256(path) {
            Ok(hash) => facts.hash = Some(hash),
            Err(e) => extraction.warn(format!("failed to hash file: {e}")),
        }
    }

    extraction.file = facts;
}

/// Extractor that never opens the SF2 structure.
///
/// Useful on catalogs of files the SF2 parser rejects, and as a fast first
/// pass over large libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStatExtractor;

impl MetadataExtractor for FileStatExtractor {
    fn name(&self) -> &'static str {
        "file-stat"
    }

    fn extract(&self, path: &Path, options: &ExtractOptions) -> Extraction {
        let mut extraction = Extraction::new(path);
        collect_file_facts(path, options, &mut extraction);
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_stat_facts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Tiny.sf2");
        std::fs::write(&path, b"not really a soundfont").unwrap();

        let extraction = FileStatExtractor.extract(&path, &ExtractOptions::default());
        assert_eq!(extraction.file.file_name, "Tiny.sf2");
        assert_eq!(extraction.file.file_size_bytes, 22);
        assert!(extraction.file.last_modified.is_some());
        assert_eq!(extraction.file.hash.as_deref().map(str::len), Some(64));
        assert!(extraction.sf2.is_none());
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn test_missing_file_warns() {
        let options = ExtractOptions {
            compute_hash: true,
            ..ExtractOptions::default()
        };
        let extraction = FileStatExtractor.extract(Path::new("/no/such.sf2"), &options);
        assert_eq!(extraction.file.file_name, "such.sf2");
        assert_eq!(extraction.warnings.len(), 2);
    }
}
