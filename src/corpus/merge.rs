//! Corpus and the merge engine
//!
//! The merge is the only path that advances the corpus. It skips every
//! identity already present (including repeats inside the new batch), then
//! sorts newest-first and truncates to the cap, so re-applying the same
//! batch is a no-op.

use crate::feed::Entry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Ordered, identity-unique collection of entries, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    entries: Vec<Entry>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a corpus from already-persisted entries, enforcing the invariants.
    pub fn from_entries(entries: Vec<Entry>, max_items: usize) -> Self {
        merge(Corpus::new(), entries, max_items).corpus
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.iter().any(|e| e.identity == identity)
    }

    /// Identity → entry lookup.
    pub fn by_identity(&self) -> HashMap<&str, &Entry> {
        self.entries
            .iter()
            .map(|e| (e.identity.as_str(), e))
            .collect()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

/// Result of one merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub corpus: Corpus,
    /// Entries appended
    pub added: usize,
    /// Entries skipped because their identity was already known
    pub duplicates: usize,
    /// Oldest entries removed by the cap
    pub dropped: usize,
}

/// Merge `new_entries` into `existing`, keeping at most `max_items`.
pub fn merge(
    existing: Corpus,
    new_entries: impl IntoIterator<Item = Entry>,
    max_items: usize,
) -> MergeOutcome {
    let mut entries = existing.entries;
    let mut seen: HashSet<String> = entries.iter().map(|e| e.identity.clone()).collect();
    let mut added = 0;
    let mut duplicates = 0;

    for entry in new_entries {
        if seen.contains(&entry.identity) {
            duplicates += 1;
            continue;
        }
        seen.insert(entry.identity.clone());
        entries.push(entry);
        added += 1;
    }

    // Stable: ties keep insertion order, so an unchanged corpus re-sorts identically.
    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let dropped = entries.len().saturating_sub(max_items);
    entries.truncate(max_items);

    MergeOutcome {
        corpus: Corpus { entries },
        added,
        duplicates,
        dropped,
    }
}
