//! Error types for the preference search index.
//!
//! The variants follow the index's failure taxonomy: storage failures are
//! fatal to the current operation, query and availability failures are
//! recovered by the caller.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the preference search index.
#[derive(Debug, Error)]
pub enum PrefSearchError {
    // Storage errors
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Build errors
    #[error("Failed to index {descriptor}: {message}")]
    Build { descriptor: String, message: String },

    #[error("Failed to parse field tree {resource}: {message}")]
    Parse { resource: String, message: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("An index build is already in progress")]
    BuildInProgress,

    #[error("Index build did not finish within {0:?}")]
    BuildTimeout(Duration),

    #[error("Index build was cancelled")]
    Cancelled,

    // Query errors
    #[error("Invalid query {query:?}: {message}")]
    Query { query: String, message: String },

    #[error("Search index is not available")]
    NotAvailable,

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, PrefSearchError>;

impl From<rusqlite::Error> for PrefSearchError {
    fn from(err: rusqlite::Error) -> Self {
        PrefSearchError::Storage {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<std::io::Error> for PrefSearchError {
    fn from(err: std::io::Error) -> Self {
        PrefSearchError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for PrefSearchError {
    fn from(err: serde_json::Error) -> Self {
        PrefSearchError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl PrefSearchError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        PrefSearchError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a storage error without an underlying SQLite error.
    pub fn storage(message: impl Into<String>) -> Self {
        PrefSearchError::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a field-tree parse error.
    pub fn parse(resource: impl Into<String>, message: impl Into<String>) -> Self {
        PrefSearchError::Parse {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Whether the caller can recover locally (retry later, show no results).
    ///
    /// Storage and IO failures leave the store unusable until the schema is
    /// verified again and are not recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PrefSearchError::Query { .. }
                | PrefSearchError::NotAvailable
                | PrefSearchError::BuildInProgress
                | PrefSearchError::BuildTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PrefSearchError::Query {
            query: "\"".into(),
            message: "no searchable characters".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid query \"\\\"\": no searchable characters"
        );
        assert_eq!(
            PrefSearchError::NotAvailable.to_string(),
            "Search index is not available"
        );
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(PrefSearchError::NotAvailable.is_recoverable());
        assert!(PrefSearchError::BuildTimeout(Duration::from_secs(5)).is_recoverable());
        assert!(!PrefSearchError::storage("disk gone").is_recoverable());
        assert!(!PrefSearchError::parse("display", "bad root").is_recoverable());
    }

    #[test]
    fn test_rusqlite_conversion_keeps_source() {
        let err: PrefSearchError = rusqlite::Error::InvalidQuery.into();
        match err {
            PrefSearchError::Storage { source, .. } => assert!(source.is_some()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
