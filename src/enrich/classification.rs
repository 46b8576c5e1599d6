//! Classification records, legacy decoding and result validation
//!
//! Cache files written by older versions hold either a bare translated
//! title or an object with scalar `method`/`topic` fields. Every stored
//! shape is decoded through `StoredClassification` and upgraded to the one
//! canonical `ClassificationRecord`; the original shape is remembered so
//! staleness can be decided.

use crate::config::Vocabulary;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Name of the label substituted when a result carries no usable labels
pub const FALLBACK_LABEL: &str = "Unclassified";
/// Confidence of the substituted label
pub const FALLBACK_CONFIDENCE: f64 = 0.1;
/// Confidence given to labels that arrive without one
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// A named label with a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub confidence: f64,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence: clamp_confidence(confidence),
        }
    }

    fn fallback() -> Self {
        Self::new(FALLBACK_LABEL, FALLBACK_CONFIDENCE)
    }
}

/// Shape a record was decoded from.
///
/// Persisted for non-structured records so a reload does not promote a
/// translation-only or legacy record to a current one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordShape {
    #[default]
    Structured,
    /// Scalar `method`/`topic` fields without label lists
    LegacyScalar,
    /// A bare translated title
    TranslationOnly,
}

impl RecordShape {
    pub fn is_structured(&self) -> bool {
        *self == RecordShape::Structured
    }
}

/// Cached classification for one raw title.
///
/// Keyed by title, so identical titles across journals share one record.
/// Always replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    #[serde(default)]
    pub translated_title: String,
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
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "RecordShape::is_structured")]
    pub shape: RecordShape,
}

impl ClassificationRecord {
    /// Record holding only a translation (classifier disabled).
    pub fn translation_only(translated_title: impl Into<String>) -> Self {
        Self {
            translated_title: translated_title.into(),
            methods: Vec::new(),
            topics: Vec::new(),
            theories: Vec::new(),
            contexts: Vec::new(),
            subjects: Vec::new(),
            novelty_score: None,
            schema_version: 0,
            shape: RecordShape::TranslationOnly,
        }
    }
}

/// Every shape found in classification cache files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StoredClassification {
    Translation(String),
    Record(RawClassification),
}

/// Loosely typed record; label fields are normalized on upgrade.
#[derive(Debug, Default, Deserialize)]
pub struct RawClassification {
    #[serde(default, alias = "title_zh", alias = "translation")]
    pub translated_title: Option<String>,
    #[serde(default)]
    pub methods: Option<Value>,
    #[serde(default)]
    pub topics: Option<Value>,
    #[serde(default)]
    pub method: Option<Value>,
    #[serde(default)]
    pub topic: Option<Value>,
    #[serde(default)]
    pub theories: Option<Value>,
    #[serde(default)]
    pub contexts: Option<Value>,
    #[serde(default)]
    pub subjects: Option<Value>,
    #[serde(default, alias = "novelty")]
    pub novelty_score: Option<Value>,
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub shape: Option<RecordShape>,
}

impl StoredClassification {
    /// Upgrade any stored shape to the canonical record.
    pub fn upgrade(self) -> ClassificationRecord {
        match self {
            StoredClassification::Translation(text) => ClassificationRecord::translation_only(text),
            StoredClassification::Record(raw) => {
                let has_lists = raw.methods.is_some() || raw.topics.is_some();
                let shape = if let Some(stored) = raw.shape {
                    stored
                } else if !has_lists && (raw.method.is_some() || raw.topic.is_some()) {
                    RecordShape::LegacyScalar
                } else if !has_lists && raw.translated_title.is_some() {
                    RecordShape::TranslationOnly
                } else {
                    RecordShape::Structured
                };
                let methods = raw.methods.as_ref().or(raw.method.as_ref());
                let topics = raw.topics.as_ref().or(raw.topic.as_ref());

                ClassificationRecord {
                    translated_title: raw.translated_title.unwrap_or_default(),
                    methods: methods.map(|v| normalize_labels(v, None)).unwrap_or_default(),
                    topics: topics.map(|v| normalize_labels(v, None)).unwrap_or_default(),
                    theories: raw.theories.as_ref().map(normalize_strings).unwrap_or_default(),
                    contexts: raw.contexts.as_ref().map(normalize_strings).unwrap_or_default(),
                    subjects: raw.subjects.as_ref().map(normalize_strings).unwrap_or_default(),
                    novelty_score: raw.novelty_score.as_ref().and_then(normalize_novelty),
                    schema_version: raw.schema_version.unwrap_or(0),
                    shape,
                }
            }
        }
    }
}

/// Decode one cache value of any known shape.
pub fn decode_record(value: Value) -> Option<ClassificationRecord> {
    serde_json::from_value::<StoredClassification>(value)
        .ok()
        .map(StoredClassification::upgrade)
}

/// Configured valid label names, matched case-insensitively.
///
/// `None` for a family means no filtering.
#[derive(Debug, Clone, Default)]
pub struct LabelVocab {
    methods: Option<HashMap<String, String>>,
    topics: Option<HashMap<String, String>>,
}

impl LabelVocab {
    pub fn from_vocabulary(vocabulary: Option<&Vocabulary>) -> Self {
        match vocabulary {
            Some(v) => Self {
                methods: canonical_names(&v.methods),
                topics: canonical_names(&v.topics),
            },
            None => Self::default(),
        }
    }

    pub fn methods(&self) -> Option<&HashMap<String, String>> {
        self.methods.as_ref()
    }

    pub fn topics(&self) -> Option<&HashMap<String, String>> {
        self.topics.as_ref()
    }
}

fn canonical_names(names: &[String]) -> Option<HashMap<String, String>> {
    if names.is_empty() {
        return None;
    }
    Some(
        names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(|n| (n.to_lowercase(), n.to_string()))
            .collect(),
    )
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn confidence_of(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(clamp_confidence).unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(clamp_confidence).unwrap_or(DEFAULT_CONFIDENCE),
        _ => DEFAULT_CONFIDENCE,
    }
}

fn label_from_object(obj: &serde_json::Map<String, Value>) -> Option<(String, f64)> {
    let name = obj
        .get("name")
        .or_else(|| obj.get("label"))
        .and_then(Value::as_str)?;
    let confidence = confidence_of(obj.get("confidence").or_else(|| obj.get("score")));
    Some((name.to_string(), confidence))
}

/// Normalize a label list of any shape.
///
/// Accepts a list (of label objects or names), a single label object, a
/// `{name: confidence}` map, or a single name; anything else is empty.
/// Confidences are clamped, duplicate names keep their highest confidence,
/// names outside `vocab` are dropped when a vocabulary is given, and the
/// result is sorted by confidence descending.
pub fn normalize_labels(value: &Value, vocab: Option<&HashMap<String, String>>) -> Vec<Label> {
    let candidates: Vec<(String, f64)> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => label_from_object(obj),
                Value::String(s) => Some((s.clone(), DEFAULT_CONFIDENCE)),
                _ => None,
            })
            .collect(),
        Value::Object(obj) if obj.contains_key("name") || obj.contains_key("label") => {
            label_from_object(obj).into_iter().collect()
        }
        Value::Object(obj) => obj
            .iter()
            .map(|(name, conf)| (name.clone(), confidence_of(Some(conf))))
            .collect(),
        Value::String(s) => vec![(s.clone(), DEFAULT_CONFIDENCE)],
        _ => Vec::new(),
    };

    let mut labels: Vec<Label> = Vec::new();
    for (name, confidence) in candidates {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let name = match vocab {
            Some(valid) => match valid.get(&name.to_lowercase()) {
                Some(canonical) => canonical.clone(),
                None => continue,
            },
            None => name.to_string(),
        };
        match labels.iter_mut().find(|l| l.name.eq_ignore_ascii_case(&name)) {
            Some(existing) => existing.confidence = existing.confidence.max(confidence),
            None => labels.push(Label::new(name, confidence)),
        }
    }

    sort_labels(&mut labels);
    labels
}

fn sort_labels(labels: &mut [Label]) {
    labels.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Keep only labels valid under `vocab`; the fallback label always survives.
pub fn filter_labels(labels: &[Label], vocab: Option<&HashMap<String, String>>) -> Vec<Label> {
    match vocab {
        None => labels.to_vec(),
        Some(valid) => labels
            .iter()
            .filter(|l| l.name == FALLBACK_LABEL || valid.contains_key(&l.name.to_lowercase()))
            .cloned()
            .collect(),
    }
}

/// Normalize a string set: list of strings or a single string, trimmed, de-duplicated.
pub fn normalize_strings(value: &Value) -> Vec<String> {
    let raw: Vec<&str> = match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::String(s) => vec![s.as_str()],
        _ => Vec::new(),
    };
    let mut out: Vec<String> = Vec::new();
    for s in raw {
        let s = s.trim();
        if !s.is_empty() && !out.iter().any(|o| o == s) {
            out.push(s.to_string());
        }
    }
    out
}

/// Novelty as an integer 1–5; numeric strings accepted, out-of-range values clamped.
pub fn normalize_novelty(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(1.0, 5.0) as u8)
}

/// Validate one service result into a record of the current schema.
pub fn validate_result(value: &Value, vocab: &LabelVocab, schema_version: u32) -> ClassificationRecord {
    let field = |names: &[&str]| names.iter().find_map(|n| value.get(*n));

    let mut methods = field(&["methods", "method"])
        .map(|v| normalize_labels(v, vocab.methods()))
        .unwrap_or_default();
    let mut topics = field(&["topics", "topic"])
        .map(|v| normalize_labels(v, vocab.topics()))
        .unwrap_or_default();
    // Each empty family gets the fallback so a stored record is never stale on arrival.
    if methods.is_empty() {
        methods = vec![Label::fallback()];
    }
    if topics.is_empty() {
        topics = vec![Label::fallback()];
    }

    ClassificationRecord {
        translated_title: field(&["translated_title", "title_zh", "translation"])
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        methods,
        topics,
        theories: field(&["theories"]).map(normalize_strings).unwrap_or_default(),
        contexts: field(&["contexts"]).map(normalize_strings).unwrap_or_default(),
        subjects: field(&["subjects"]).map(normalize_strings).unwrap_or_default(),
        novelty_score: field(&["novelty_score", "novelty"]).and_then(normalize_novelty),
        schema_version,
        shape: RecordShape::Structured,
    }
}

/// Whether a cached record needs re-classification.
pub fn is_stale(record: Option<&ClassificationRecord>, vocab: &LabelVocab, schema_version: u32) -> bool {
    let Some(record) = record else {
        return true;
    };
    record.shape != RecordShape::Structured
        || record.schema_version != schema_version
        || filter_labels(&record.methods, vocab.methods()).is_empty()
        || filter_labels(&record.topics, vocab.topics()).is_empty()
}
