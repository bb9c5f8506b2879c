//! Error types for sensorkit-store.

use std::path::PathBuf;

use sensorkit_types::StorageError;

/// Result type for sensorkit-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sensorkit-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored timestamp cannot be represented.
    #[error("Invalid stored timestamp for {key}: {value}")]
    InvalidTimestamp { key: String, value: i64 },

    /// The database was written by a newer schema.
    #[error("Unsupported schema version {found} (newest known is {supported})")]
    UnsupportedSchema { found: i32, supported: i32 },
}

impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::with_source("sqlite checkpoint store", err)
    }
}
