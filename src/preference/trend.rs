//! Monthly favorite-rate trend

use crate::feed::Entry;
use serde::Serialize;
use std::collections::BTreeMap;

/// Interaction counts for one publish month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    /// `YYYY-MM`
    pub month: String,
    pub positive: usize,
    pub negative: usize,
    /// positive / (positive + negative)
    pub favorite_rate: f64,
}

/// Buckets for the most recent `months` distinct publish months, oldest first.
pub fn monthly_trend(positive: &[&Entry], negative: &[&Entry], months: usize) -> Vec<TrendBucket> {
    let mut buckets: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for entry in positive {
        buckets.entry(month_key(entry)).or_default().0 += 1;
    }
    for entry in negative {
        buckets.entry(month_key(entry)).or_default().1 += 1;
    }

    let skip = buckets.len().saturating_sub(months);
    buckets
        .into_iter()
        .skip(skip)
        .map(|(month, (positive, negative))| TrendBucket {
            favorite_rate: positive as f64 / (positive + negative) as f64,
            month,
            positive,
            negative,
        })
        .collect()
}

fn month_key(entry: &Entry) -> String {
    entry.published_at.format("%Y-%m").to_string()
}
