//! Streaming SHA256 of soundfont files, used to notice changed files on rescan.

use crate::error::{FontshelfError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Chunk size for reading files (1MB).
const CHUNK_SIZE: usize = 1024 * 1024;

/// SHA256 of the file at `path` as lowercase hex.
pub fn compute_sha256(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| FontshelfError::io_with_path(e, path))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| FontshelfError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sha256_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(
            compute_sha256(file.path()).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_changes_with_content() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"RIFF").unwrap();
        file.flush().unwrap();
        let first = compute_sha256(file.path()).unwrap();

        file.write_all(b"sfbk").unwrap();
        file.flush().unwrap();
        let second = compute_sha256(file.path()).unwrap();

        assert_eq!(first.len(), 64);
        assert_ne!(first, second);
    }

    #[test]
    fn test_sha256_missing_file() {
        assert!(compute_sha256("/no/such/file.sf2").is_err());
    }
}
