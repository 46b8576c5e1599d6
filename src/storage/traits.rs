//! Storage error types and the snapshot contract

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while persisting a snapshot
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A value persisted as one whole file.
///
/// Loading never fails: a missing or malformed file yields the empty value.
/// Saving replaces the file in one step, so readers see either the previous
/// snapshot or the new one.
pub trait Snapshot: Serialize + DeserializeOwned + Default {
    /// Load the snapshot at `path`, or the empty value.
    fn load_or_default(path: impl AsRef<Path>) -> Self {
        super::json::read_or_default(path.as_ref())
    }

    /// Overwrite the snapshot at `path`.
    fn save(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        super::json::write_atomic(path.as_ref(), self)
    }
}
