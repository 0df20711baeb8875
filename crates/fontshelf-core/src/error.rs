//! Error types for Fontshelf.
//!
//! Collection-building failures (a single unreadable soundfont) are recorded and
//! skipped by callers; everything that reaches this enum through `?` ends the
//! current operation.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the Fontshelf library.
#[derive(Debug, Error)]
pub enum FontshelfError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("CSV error: {message}")]
    Csv {
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    #[error("MIDI error: {message}")]
    Midi { message: String },

    // Catalog errors
    #[error("Soundfont not found: {id}")]
    SoundfontNotFound { id: u64 },

    #[error("Failed to extract metadata from {path}: {message}")]
    ExtractionFailed { path: PathBuf, message: String },

    #[error("Timbre analysis failed: {message}")]
    AnalysisFailed { message: String },

    // Synthesizer errors
    #[error("Synthesizer unavailable: {message}")]
    SynthUnavailable { message: String },

    #[error("Synthesizer failed: {message}")]
    SynthFailed {
        message: String,
        status: Option<i32>,
    },

    #[error("Synthesizer timed out after {0:?}")]
    SynthTimeout(Duration),

    #[error("Operation cancelled by user")]
    Cancelled,

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Fontshelf operations.
pub type Result<T> = std::result::Result<T, FontshelfError>;

// Conversion implementations for common error types

impl From<std::io::Error> for FontshelfError {
    fn from(err: std::io::Error) -> Self {
        FontshelfError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for FontshelfError {
    fn from(err: serde_json::Error) -> Self {
        FontshelfError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<csv::Error> for FontshelfError {
    fn from(err: csv::Error) -> Self {
        FontshelfError::Csv {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl FontshelfError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        FontshelfError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        FontshelfError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True when the failure only removes an optional capability
    /// (playback, rendering, timbre) and cataloging can carry on.
    pub fn is_degraded_capability(&self) -> bool {
        matches!(
            self,
            FontshelfError::SynthUnavailable { .. }
                | FontshelfError::SynthFailed { .. }
                | FontshelfError::SynthTimeout(_)
                | FontshelfError::AnalysisFailed { .. }
        )
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FontshelfError::SynthTimeout(_))
    }

    /// Check whether this is a lookup miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FontshelfError::SoundfontNotFound { .. } | FontshelfError::FileNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FontshelfError::SoundfontNotFound { id: 42 };
        assert_eq!(err.to_string(), "Soundfont not found: 42");

        let err = FontshelfError::validation("file_path", "must not be empty");
        assert_eq!(
            err.to_string(),
            "Validation error for file_path: must not be empty"
        );
    }

    #[test]
    fn test_io_with_path_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = FontshelfError::io_with_path(io, "/tmp/catalog.json");
        match err {
            FontshelfError::Io { path, source, .. } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/catalog.json")));
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_degraded_capability_errors() {
        assert!(FontshelfError::SynthUnavailable {
            message: "fluidsynth not found".into()
        }
        .is_degraded_capability());
        assert!(!FontshelfError::Config {
            message: "bad".into()
        }
        .is_degraded_capability());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(FontshelfError::SynthTimeout(Duration::from_secs(5)).is_retryable());
        assert!(!FontshelfError::SoundfontNotFound { id: 1 }.is_retryable());
    }

    #[test]
    fn test_not_found_is_distinguished() {
        assert!(FontshelfError::SoundfontNotFound { id: 7 }.is_not_found());
        assert!(!FontshelfError::Cancelled.is_not_found());
    }
}
