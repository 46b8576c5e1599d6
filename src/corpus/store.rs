//! Corpus snapshot load/save

use super::merge::Corpus;
use crate::feed::Entry;
use crate::storage::{read_or_default, write_atomic, StorageResult};
use std::path::Path;
use tracing::{info, warn};

/// Load the persisted corpus.
///
/// A missing or corrupt file is an empty corpus (full re-ingest). Entries
/// that fail to decode are dropped one by one instead of discarding the file.
pub fn load_corpus(path: &Path, max_items: usize) -> Corpus {
    let raw: Vec<serde_json::Value> = read_or_default(path);
    let total = raw.len();
    let entries: Vec<Entry> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Entry>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "dropping undecodable corpus entry");
                None
            }
        })
        .collect();

    if entries.len() < total {
        warn!(kept = entries.len(), total, "corpus partially decoded");
    }
    Corpus::from_entries(entries, max_items)
}

/// Overwrite the corpus snapshot.
pub fn save_corpus(path: &Path, corpus: &Corpus) -> StorageResult<()> {
    write_atomic(path, corpus)?;
    info!(path = %path.display(), entries = corpus.len(), "corpus persisted");
    Ok(())
}
