//! Crash-safe file replacement for the catalog, settings, CSV exports and
//! MIDI output.
//!
//! Every write goes to a sibling temp file, is synced, and is then renamed
//! over the target. A catalog save may first copy the current file to
//! `<name>.bak`. Whatever fails, the target keeps its previous contents and
//! no temp file is left behind.

use crate::{FontshelfError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Distinguishes temp files of concurrent writers in one process.
static WRITE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Parse the JSON file at `path`, or `None` if there is no such file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(FontshelfError::io_with_path(e, path)),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| FontshelfError::Json {
            message: format!("{} is not a valid document: {}", path.display(), e),
            source: Some(e),
        })
}

/// Pretty-print `data` and replace `path` with it.
///
/// Serialization happens before the filesystem is touched.
pub fn write_json_file<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    let mut serialized = serde_json::to_vec_pretty(data).map_err(|e| FontshelfError::Json {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;
    serialized.push(b'\n');
    write_file_atomic(path, &serialized, keep_backup)
}

/// Replace `path` with `bytes`, creating parent directories as needed.
pub fn write_file_atomic(path: &Path, bytes: &[u8], keep_backup: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| FontshelfError::io_with_path(e, parent))?;
    }

    let temp_path = temp_path_for(path);
    let result = write_synced(&temp_path, bytes).and_then(|()| {
        if keep_backup && path.is_file() {
            backup(path);
        }
        fs::rename(&temp_path, path).map_err(|e| FontshelfError::Io {
            message: format!("Failed to move {} into place: {}", temp_path.display(), e),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    } else {
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    }
    result
}

/// Where the previous version of `path` is kept: `soundfonts.json` becomes
/// `soundfonts.json.bak`.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

// Backup failures are logged and never fail the write.
fn backup(path: &Path) {
    let backup_path = backup_path_for(path);
    match fs::copy(path, &backup_path) {
        Ok(_) => debug!("Backed up {} to {}", path.display(), backup_path.display()),
        Err(e) => warn!("Could not back up {}: {}", path.display(), e),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(
        ".{}-{}.tmp",
        std::process::id(),
        WRITE_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ));
    path.with_file_name(name)
}

fn write_synced(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(temp_path).map_err(|e| FontshelfError::io_with_path(e, temp_path))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| FontshelfError::io_with_path(e, temp_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        next_id: u64,
        names: Vec<String>,
    }

    fn doc(next_id: u64, names: &[&str]) -> Doc {
        Doc {
            next_id,
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    fn temp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
            .collect()
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("soundfonts.json");

        write_json_file(&path, &doc(3, &["Piano", "Kit"]), false).unwrap();
        let read: Option<Doc> = read_json_file(&path).unwrap();
        assert_eq!(read, Some(doc(3, &["Piano", "Kit"])));
        assert!(temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_backup_holds_previous_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("soundfonts.json");

        write_json_file(&path, &doc(2, &["Piano"]), true).unwrap();
        assert!(!backup_path_for(&path).exists());
        write_json_file(&path, &doc(3, &["Piano", "Kit"]), true).unwrap();

        assert!(backup_path_for(&path).ends_with("soundfonts.json.bak"));
        let backup: Option<Doc> = read_json_file(&backup_path_for(&path)).unwrap();
        assert_eq!(backup, Some(doc(2, &["Piano"])));
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let temp_dir = TempDir::new().unwrap();
        let missing: Option<Doc> = read_json_file(&temp_dir.path().join("none.json")).unwrap();
        assert!(missing.is_none());

        let broken = temp_dir.path().join("broken.json");
        fs::write(&broken, "{ \"next_id\": ").unwrap();
        let result: Result<Option<Doc>> = read_json_file(&broken);
        assert!(matches!(result, Err(FontshelfError::Json { .. })));
    }

    #[test]
    fn test_parent_directories_created() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("exports").join("2026").join("catalog.csv");

        write_file_atomic(&path, b"id,name\n", false).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"id,name\n");
    }

    #[test]
    fn test_unserializable_data_leaves_file_alone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("soundfonts.json");
        write_json_file(&path, &doc(2, &["Piano"]), false).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        // Tuple keys have no JSON object-key form.
        let bad: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        assert!(write_json_file(&path, &bad, true).is_err());

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert!(!backup_path_for(&path).exists());
        assert!(temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_failed_rename_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        // A non-empty directory at the target path makes the rename fail.
        let path = temp_dir.path().join("composition.mid");
        fs::create_dir_all(path.join("inner")).unwrap();

        let result = write_file_atomic(&path, b"MThd", false);
        assert!(matches!(result, Err(FontshelfError::Io { .. })));
        assert!(path.join("inner").exists());
        assert!(temp_files(temp_dir.path()).is_empty());
    }
}
