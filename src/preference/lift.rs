//! Smoothed lift with Wilson-interval confidence
//!
//! For a key with `fav` positive and `hid` negative occurrences:
//!
//! ```text
//! lift = ((fav + 1) / (favTotal + distinct)) / ((hid + 1) / (hidTotal + distinct))
//! ```
//!
//! Add-one smoothing keeps lift finite and strictly positive for every key.
//! Confidence is one minus the width of the 95% Wilson interval for
//! `fav / (fav + hid)`, scaled by a log sample-size weight.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

const Z: f64 = 1.96;

/// Positive and negative occurrence counts for one feature family.
#[derive(Debug, Clone, Default)]
pub struct FeatureCounts {
    positive: HashMap<String, u32>,
    negative: HashMap<String, u32>,
}

impl FeatureCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_positive(&mut self, key: &str) {
        *self.positive.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn add_negative(&mut self, key: &str) {
        *self.negative.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn positive_total(&self) -> u32 {
        self.positive.values().sum()
    }

    pub fn negative_total(&self) -> u32 {
        self.negative.values().sum()
    }

    /// Distinct keys across both sets.
    pub fn distinct_keys(&self) -> usize {
        self.positive
            .keys()
            .chain(self.negative.keys())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Most frequent positive keys, ties by key.
    pub fn top_positive(&self, k: usize) -> Vec<KeyCount> {
        let mut counts: Vec<KeyCount> = self
            .positive
            .iter()
            .map(|(key, &count)| KeyCount {
                key: key.clone(),
                count,
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        counts.truncate(k);
        counts
    }
}

/// A key with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCount {
    pub key: String,
    pub count: u32,
}

/// Lift and confidence for one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiftScore {
    pub key: String,
    pub favorite_count: u32,
    pub hidden_count: u32,
    pub lift: f64,
    pub confidence: f64,
}

/// 95% Wilson score interval for a proportion `p` over `n` trials.
pub fn wilson_interval(p: f64, n: f64) -> (f64, f64) {
    if n <= 0.0 {
        return (0.0, 1.0);
    }
    let z2 = Z * Z;
    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let margin = Z * ((p * (1.0 - p) + z2 / (4.0 * n)) / n).sqrt() / denom;
    ((center - margin).max(0.0), (center + margin).min(1.0))
}

/// Score one key.
pub fn score(
    favorite_count: u32,
    hidden_count: u32,
    favorite_total: u32,
    hidden_total: u32,
    distinct_keys: usize,
) -> (f64, f64) {
    let fav = f64::from(favorite_count);
    let hid = f64::from(hidden_count);
    let distinct = distinct_keys as f64;

    let fav_rate = (fav + 1.0) / (f64::from(favorite_total) + distinct);
    let hid_rate = (hid + 1.0) / (f64::from(hidden_total) + distinct);
    let lift = fav_rate / hid_rate;

    let n = fav + hid;
    if n <= 0.0 {
        return (lift, 0.0);
    }
    let (low, high) = wilson_interval(fav / n, n);
    let max_total = f64::from(favorite_total.max(hidden_total));
    let sample_weight = ((n + 1.0).ln() / (max_total + 1.0).ln()).min(1.0);
    let confidence = (1.0 - (high - low)) * sample_weight;
    (lift, confidence.clamp(0.0, 1.0))
}

/// Score every key with at least `threshold` total occurrences, by lift descending.
pub fn lift_table(counts: &FeatureCounts, threshold: u32) -> Vec<LiftScore> {
    let favorite_total = counts.positive_total();
    let hidden_total = counts.negative_total();
    let distinct = counts.distinct_keys();
    let threshold = threshold.max(1);

    let keys: BTreeSet<&String> = counts.positive.keys().chain(counts.negative.keys()).collect();
    let mut table: Vec<LiftScore> = keys
        .into_iter()
        .filter_map(|key| {
            let favorite_count = counts.positive.get(key).copied().unwrap_or(0);
            let hidden_count = counts.negative.get(key).copied().unwrap_or(0);
            if favorite_count + hidden_count < threshold {
                return None;
            }
            let (lift, confidence) = score(favorite_count, hidden_count, favorite_total, hidden_total, distinct);
            Some(LiftScore {
                key: key.clone(),
                favorite_count,
                hidden_count,
                lift,
                confidence,
            })
        })
        .collect();

    table.sort_by(|a, b| {
        b.lift
            .partial_cmp(&a.lift)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
            .then_with(|| a.key.cmp(&b.key))
    });
    table
}

/// Top-k preferred and bottom-k avoided keys of a ranked table.
///
/// The table is split at lift 1 so a key lands in at most one list; keys
/// with lift exactly 1 are in neither.
pub fn preferred_and_avoided(table: &[LiftScore], k: usize) -> (Vec<LiftScore>, Vec<LiftScore>) {
    let preferred = table.iter().filter(|s| s.lift > 1.0).take(k).cloned().collect();
    let avoided = table.iter().rev().filter(|s| s.lift < 1.0).take(k).cloned().collect();
    (preferred, avoided)
}
