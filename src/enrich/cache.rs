//! Keyed record caches backed by one JSON file each

use super::abstracts::AbstractRecord;
use super::classification::{decode_record, ClassificationRecord};
use crate::storage::{read_or_default, write_atomic, StorageResult};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Concurrent map of key → record, persisted as a JSON object.
///
/// Records are replaced wholesale. Values that fail to decode are dropped
/// individually on load.
#[derive(Debug)]
pub struct RecordCache<V> {
    path: Option<PathBuf>,
    records: DashMap<String, V>,
}

/// Classification records keyed by raw title
pub type ClassificationCache = RecordCache<ClassificationRecord>;
/// Abstract records keyed by entry identity
pub type AbstractCache = RecordCache<AbstractRecord>;

impl<V: Clone + Serialize> RecordCache<V> {
    /// Cache that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: DashMap::new(),
        }
    }

    /// Load with a custom per-value decoder.
    pub fn load_with(path: &Path, decode: impl Fn(Value) -> Option<V>) -> Self {
        let raw: HashMap<String, Value> = read_or_default(path);
        let total = raw.len();
        let records = DashMap::new();
        for (key, value) in raw {
            match decode(value) {
                Some(record) => {
                    records.insert(key, record);
                }
                None => debug!(key = %key, "dropping undecodable cache record"),
            }
        }
        if records.len() < total {
            warn!(path = %path.display(), kept = records.len(), total, "cache partially decoded");
        }
        Self {
            path: Some(path.to_path_buf()),
            records,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.records.get(key).map(|r| r.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn insert(&self, key: impl Into<String>, record: V) {
        self.records.insert(key.into(), record);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.records.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every record, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, V> {
        self.records
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Persist the whole cache. No-op for in-memory caches.
    pub fn save(&self) -> StorageResult<()> {
        match &self.path {
            Some(path) => write_atomic(path, &self.snapshot()),
            None => Ok(()),
        }
    }
}

impl<V: Clone + Serialize + DeserializeOwned> RecordCache<V> {
    /// Load records that deserialize directly.
    pub fn load(path: &Path) -> Self {
        Self::load_with(path, |value| serde_json::from_value(value).ok())
    }
}

impl ClassificationCache {
    /// Load every stored shape, upgrading legacy records.
    pub fn load_classifications(path: &Path) -> Self {
        Self::load_with(path, decode_record)
    }
}
