//! Source-set change detection
//!
//! The fingerprint only signals a change. History is retained when the
//! source list changes: entries from removed sources stay in the corpus and
//! age out through the cap.

use crate::storage::{write_text_atomic, StorageResult};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

/// SHA-256 hex of the trimmed source list joined by newlines.
pub fn fingerprint<S: AsRef<str>>(sources: &[S]) -> String {
    let joined = sources
        .iter()
        .map(|s| s.as_ref().trim())
        .collect::<Vec<_>>()
        .join("\n");
    let content = format!("{}\n", joined.trim());
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Outcome of comparing the current source list with the persisted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange {
    /// No previous fingerprint on disk
    FirstRun,
    Unchanged,
    /// The list differs from the last run
    Changed { previous: String },
}

impl SourceChange {
    pub fn sources_changed(&self) -> bool {
        matches!(self, SourceChange::Changed { .. })
    }
}

/// Compare `current` against the fingerprint file, then persist `current`.
pub fn detect_change(path: &Path, current: &str) -> StorageResult<SourceChange> {
    let previous = std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let change = match previous {
        None => SourceChange::FirstRun,
        Some(prev) if prev == current => SourceChange::Unchanged,
        Some(prev) => {
            warn!("source list changed; keeping corpus history");
            SourceChange::Changed { previous: prev }
        }
    };

    if change != SourceChange::Unchanged {
        write_text_atomic(path, current)?;
        info!(fingerprint = %current, "source fingerprint recorded");
    }
    Ok(change)
}
