//! User corrections
//!
//! A correction replaces the model's classification fields for one
//! identity. It is stored wholesale and removed only on explicit request.

use crate::enrich::classification::{normalize_labels, normalize_novelty, normalize_strings};
use crate::enrich::{Label, RecordCache};
use crate::storage::StorageResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Manual override of one identity's classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCorrection {
    #[serde(default)]
    pub methods: Vec<Label>,
    #[serde(default)]
    pub topics: Vec<Label>,
    #[serde(default)]
    pub theories: Vec<String>,
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub novelty_score: Option<u8>,
    #[serde(default)]
    pub correction_count: u32,
    pub updated_at: DateTime<Utc>,
}

/// Corrections keyed by entry identity
pub type CorrectionStore = RecordCache<UserCorrection>;

impl UserCorrection {
    /// Build a correction from a loosely shaped payload.
    ///
    /// Malformed fields default to empty instead of rejecting the payload.
    pub fn from_payload(payload: &Value, previous: Option<&UserCorrection>) -> Self {
        let field = |names: &[&str]| names.iter().find_map(|n| payload.get(*n));
        Self {
            methods: field(&["methods", "method"])
                .map(|v| normalize_labels(v, None))
                .unwrap_or_default(),
            topics: field(&["topics", "topic"])
                .map(|v| normalize_labels(v, None))
                .unwrap_or_default(),
            theories: field(&["theories"]).map(normalize_strings).unwrap_or_default(),
            contexts: field(&["contexts"]).map(normalize_strings).unwrap_or_default(),
            subjects: field(&["subjects"]).map(normalize_strings).unwrap_or_default(),
            novelty_score: field(&["novelty_score", "novelty"]).and_then(normalize_novelty),
            correction_count: previous.map_or(0, |p| p.correction_count) + 1,
            updated_at: Utc::now(),
        }
    }
}

/// Replace the correction for `identity` and persist the store.
pub fn apply_correction(store: &CorrectionStore, identity: &str, payload: &Value) -> StorageResult<UserCorrection> {
    let previous = store.get(identity);
    let correction = UserCorrection::from_payload(payload, previous.as_ref());
    store.insert(identity, correction.clone());
    store.save()?;
    info!(identity, count = correction.correction_count, "correction applied");
    Ok(correction)
}

/// Remove the correction for `identity`. Returns whether one existed.
pub fn clear_correction(store: &CorrectionStore, identity: &str) -> StorageResult<bool> {
    let removed = store.remove(identity).is_some();
    if removed {
        store.save()?;
        info!(identity, "correction cleared");
    }
    Ok(removed)
}
