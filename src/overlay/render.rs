//! Classification as seen by readers: corrections win over the model

use super::corrections::UserCorrection;
use crate::enrich::{ClassificationRecord, Label, RecordShape};
use serde::Serialize;

/// Where the resolved fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Model,
    User,
    None,
}

/// Classification fields after the overlay is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedClassification {
    pub classification_source: ClassificationSource,
    pub translated_title: String,
    pub methods: Vec<Label>,
    pub topics: Vec<Label>,
    pub theories: Vec<String>,
    pub contexts: Vec<String>,
    pub subjects: Vec<String>,
    pub novelty_score: Option<u8>,
}

/// Resolve the classification for one entry.
///
/// A correction replaces every classification field; the translated title
/// always comes from the model record.
pub fn resolve_classification(
    record: Option<&ClassificationRecord>,
    correction: Option<&UserCorrection>,
) -> ResolvedClassification {
    let translated_title = record.map(|r| r.translated_title.clone()).unwrap_or_default();

    if let Some(c) = correction {
        return ResolvedClassification {
            classification_source: ClassificationSource::User,
            translated_title,
            methods: c.methods.clone(),
            topics: c.topics.clone(),
            theories: c.theories.clone(),
            contexts: c.contexts.clone(),
            subjects: c.subjects.clone(),
            novelty_score: c.novelty_score,
        };
    }

    match record {
        Some(r) if r.shape != RecordShape::TranslationOnly => ResolvedClassification {
            classification_source: ClassificationSource::Model,
            translated_title,
            methods: r.methods.clone(),
            topics: r.topics.clone(),
            theories: r.theories.clone(),
            contexts: r.contexts.clone(),
            subjects: r.subjects.clone(),
            novelty_score: r.novelty_score,
        },
        _ => ResolvedClassification {
            classification_source: ClassificationSource::None,
            translated_title,
            methods: Vec::new(),
            topics: Vec::new(),
            theories: Vec::new(),
            contexts: Vec::new(),
            subjects: Vec::new(),
            novelty_score: None,
        },
    }
}
