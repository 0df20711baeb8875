//! The JSON catalog document.
//!
//! Current layout:
//! ```json
//! { "version": 1, "next_id": 4, "soundfonts": [ { ... }, ... ] }
//! ```
//! Older catalogs were a bare array of records; those still load.

use super::atomic::{read_json_file, write_json_file};
use crate::catalog::{CatalogIndex, SoundfontRecord, FIRST_ID};
use crate::config::CatalogConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    soundfonts: Vec<SoundfontRecord>,
}

#[derive(Serialize)]
struct CatalogDocumentRef<'a> {
    version: u32,
    next_id: u64,
    soundfonts: Vec<&'a SoundfontRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCatalog {
    Legacy(Vec<SoundfontRecord>),
    Document(CatalogDocument),
}

/// Load the catalog at `path`. A missing file yields an empty catalog.
pub fn load_catalog(path: &Path) -> Result<CatalogIndex> {
    let Some(stored) = read_json_file::<StoredCatalog>(path)? else {
        debug!("No catalog at {}, starting empty", path.display());
        return Ok(CatalogIndex::new());
    };

    let (records, next_id) = match stored {
        StoredCatalog::Document(doc) => {
            if doc.version > CatalogConfig::DOCUMENT_VERSION {
                debug!(
                    "Catalog {} has newer version {}, reading known fields only",
                    path.display(),
                    doc.version
                );
            }
            (doc.soundfonts, doc.next_id)
        }
        StoredCatalog::Legacy(records) => {
            info!("Upgrading legacy catalog format at {}", path.display());
            (records, FIRST_ID)
        }
    };

    let index = CatalogIndex::from_records(records, next_id);
    info!("Loaded {} soundfonts from {}", index.len(), path.display());
    Ok(index)
}

/// Write the whole catalog to `path` atomically, keeping a `.bak` of the
/// previous file.
pub fn save_catalog(path: &Path, catalog: &CatalogIndex) -> Result<()> {
    let document = CatalogDocumentRef {
        version: CatalogConfig::DOCUMENT_VERSION,
        next_id: catalog.next_id(),
        soundfonts: catalog.all().collect(),
    };
    write_json_file(path, &document, CatalogConfig::KEEP_BACKUP)?;
    debug!("Saved {} soundfonts to {}", catalog.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Quality;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let index = load_catalog(&temp_dir.path().join("none.json")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_save_and_load_preserves_ids() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("soundfonts.json");

        let mut index = CatalogIndex::new();
        let a = index.insert_or_update(SoundfontRecord::new("/sf/a.sf2"), false).unwrap();
        let b = index
            .insert_or_update(SoundfontRecord::new("/sf/b.sf2").with_quality(Quality::High), false)
            .unwrap();
        index.remove(a);
        save_catalog(&path, &index).unwrap();

        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(b), index.get(b));
        assert_eq!(loaded.next_id(), index.next_id());
        assert!(loaded.indices_consistent());
    }

    #[test]
    fn test_legacy_array_loads() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 1, "path": "/sf/a.sf2", "tags": ["Piano"], "quality": "good"},
                {"id": 2, "path": "/sf/b.sf2", "instrument_type": "Strings"}
            ]"#,
        )
        .unwrap();

        let index = load_catalog(&path).unwrap();
        assert_eq!(index.len(), 2);
        let a = index.by_path("/sf/a.sf2").unwrap();
        assert_eq!(a.quality, Quality::Unknown);
        assert!(a.tags.contains("piano"));
        assert_eq!(index.by_instrument_type("strings").len(), 1);
        assert!(index.next_id() > 2);
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("future.json");
        std::fs::write(
            &path,
            r#"{
                "version": 9,
                "next_id": 10,
                "written_by": "a newer build",
                "soundfonts": [{"id": 3, "file_path": "/sf/a.sf2", "sparkle": true}]
            }"#,
        )
        .unwrap();

        let index = load_catalog(&path).unwrap();
        assert_eq!(index.get(3).unwrap().file_path, "/sf/a.sf2");
        assert_eq!(index.next_id(), 10);
    }

    #[test]
    fn test_out_of_range_values_still_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("soundfonts.json");
        std::fs::write(
            &path,
            r#"{
                "version": 1,
                "next_id": 3,
                "soundfonts": [
                    {"id": 18446744073709551615, "file_path": "/sf/a.sf2"},
                    {"id": 2, "file_path": "/sf/b.sf2",
                     "note_range": {"min_note": "C999999999", "max_note": "C8"}}
                ]
            }"#,
        )
        .unwrap();

        let index = load_catalog(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.by_path("/sf/a.sf2").unwrap().id, 3);
        assert_eq!(index.by_path("/sf/b.sf2").unwrap().note_range, None);
        assert_eq!(index.next_id(), 4);
        assert!(index.indices_consistent());
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_catalog(&path).is_err());
    }
}
