//! Error handling for the outbreak clustering engine.

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

pub mod util;

/// Specialized error type for the clustering engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed coordinates, dates or table values reached the core.
    /// This is a caller contract violation and is never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A persisted distance matrix no longer matches the current case ordering
    #[error("Cache integrity error for diagnosis '{diagnosis}': {reason}")]
    CacheIntegrity { diagnosis: String, reason: String },

    /// A required column is missing from the case table
    #[error("Column '{column}' not found")]
    ColumnNotFound { column: String },

    /// A column exists but has an unusable type
    #[error("Column '{column}' is not a {expected} array")]
    ColumnType { column: String, expected: String },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Clustering a single diagnosis group failed
    #[error("Clustering failed for diagnosis '{diagnosis}': {source}")]
    GroupFailed {
        diagnosis: String,
        #[source]
        source: Box<Error>,
    },

    /// A previous run panicked while holding the engine lock
    #[error("Clustering engine lock poisoned")]
    LockPoisoned,

    /// Error opening, reading or writing a file
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an IO error tied to a path
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error as the failure of one diagnosis group
    #[must_use]
    pub fn group_failed(diagnosis: impl Into<String>, source: Self) -> Self {
        Self::GroupFailed {
            diagnosis: diagnosis.into(),
            source: Box::new(source),
        }
    }
}

/// Result type for clustering operations
pub type Result<T> = std::result::Result<T, Error>;
