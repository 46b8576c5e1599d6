//! Feature extraction per entry

use super::tokenize::{bigrams, tokenize};
use crate::enrich::{ClassificationRecord, Label, FALLBACK_LABEL};
use crate::feed::{strip_markup, Entry, UNKNOWN_JOURNAL};
use crate::overlay::{resolve_classification, UserCorrection};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// A feature family counted and scored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFamily {
    Term,
    Bigram,
    Journal,
    Source,
    Method,
    Topic,
}

impl FeatureFamily {
    pub const ALL: [FeatureFamily; 6] = [
        FeatureFamily::Term,
        FeatureFamily::Bigram,
        FeatureFamily::Journal,
        FeatureFamily::Source,
        FeatureFamily::Method,
        FeatureFamily::Topic,
    ];

    /// Method and topic labels use the stricter occurrence threshold.
    pub fn is_label(self) -> bool {
        matches!(self, FeatureFamily::Method | FeatureFamily::Topic)
    }
}

/// Distinct feature keys of one entry, per family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFeatures {
    pub terms: BTreeSet<String>,
    pub bigrams: BTreeSet<String>,
    pub journal: Option<String>,
    pub source: Option<String>,
    pub methods: BTreeSet<String>,
    pub topics: BTreeSet<String>,
}

impl ItemFeatures {
    /// Keys of one family.
    pub fn keys(&self, family: FeatureFamily) -> Vec<&str> {
        match family {
            FeatureFamily::Term => self.terms.iter().map(String::as_str).collect(),
            FeatureFamily::Bigram => self.bigrams.iter().map(String::as_str).collect(),
            FeatureFamily::Journal => self.journal.iter().map(String::as_str).collect(),
            FeatureFamily::Source => self.source.iter().map(String::as_str).collect(),
            FeatureFamily::Method => self.methods.iter().map(String::as_str).collect(),
            FeatureFamily::Topic => self.topics.iter().map(String::as_str).collect(),
        }
    }
}

/// Lowercased, whitespace-collapsed name; `None` when empty or unknown.
pub fn normalize_name(name: &str) -> Option<String> {
    let collapsed = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();
    if collapsed.is_empty() || collapsed == UNKNOWN_JOURNAL.to_lowercase() {
        None
    } else {
        Some(collapsed)
    }
}

fn source_pattern() -> Option<&'static Regex> {
    static SOURCE: OnceLock<Option<Regex>> = OnceLock::new();
    SOURCE
        .get_or_init(|| Regex::new(r"(?i)\bsource:\s*([^,;|]+)").ok())
        .as_ref()
}

/// The `Source:` field some publishers embed in the item summary.
pub fn extract_source_field(summary: &str) -> Option<String> {
    let text = strip_markup(summary);
    let captures = source_pattern()?.captures(&text)?;
    let value = captures.get(1)?.as_str();
    // Publishers follow the journal name with "Volume"/"Author(s)" in the same run of text.
    let value = ["Volume", "Author(s)", "Available online", "Publication date"]
        .iter()
        .filter_map(|marker| value.find(marker))
        .min()
        .map_or(value, |cut| &value[..cut]);
    normalize_name(value)
}

fn label_names(labels: &[Label]) -> BTreeSet<String> {
    labels
        .iter()
        .filter(|l| l.name != FALLBACK_LABEL)
        .filter_map(|l| normalize_name(&l.name))
        .collect()
}

/// Extract every feature family for one entry, with corrections applied.
pub fn extract_features(
    entry: &Entry,
    record: Option<&ClassificationRecord>,
    correction: Option<&UserCorrection>,
) -> ItemFeatures {
    let tokens = tokenize(&entry.title);
    let resolved = resolve_classification(record, correction);

    ItemFeatures {
        bigrams: bigrams(&tokens).into_iter().collect(),
        terms: tokens.into_iter().collect(),
        journal: normalize_name(&entry.journal),
        source: extract_source_field(&entry.summary),
        methods: label_names(&resolved.methods),
        topics: label_names(&resolved.topics),
    }
}
