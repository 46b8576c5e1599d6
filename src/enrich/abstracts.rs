//! Abstract records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an abstract came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractSource {
    Crossref,
    SemanticScholar,
    /// Written by the model from the title alone
    GptGenerated,
    /// Model summary of a fetched abstract
    GptSummarized,
    UserProvided,
}

impl AbstractSource {
    /// Sources whose text must never be re-summarized.
    pub fn is_protected(self) -> bool {
        matches!(
            self,
            AbstractSource::GptGenerated | AbstractSource::GptSummarized | AbstractSource::UserProvided
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AbstractSource::Crossref => "crossref",
            AbstractSource::SemanticScholar => "semantic_scholar",
            AbstractSource::GptGenerated => "gpt_generated",
            AbstractSource::GptSummarized => "gpt_summarized",
            AbstractSource::UserProvided => "user_provided",
        }
    }
}

/// Cached abstract for one entry identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractRecord {
    pub abstract_text: String,
    /// Text before summarization; empty when never summarized
    #[serde(default)]
    pub raw_abstract_text: String,
    pub source: AbstractSource,
    pub fetched_at: DateTime<Utc>,
}

impl AbstractRecord {
    pub fn new(text: impl Into<String>, source: AbstractSource) -> Self {
        Self {
            abstract_text: text.into(),
            raw_abstract_text: String::new(),
            source,
            fetched_at: Utc::now(),
        }
    }

    /// Whether an explicit summarize request may replace this text.
    pub fn can_summarize(&self) -> bool {
        !self.source.is_protected() && !self.abstract_text.trim().is_empty()
    }

    /// Text to feed the summarizer: the retained original when present.
    pub fn source_text(&self) -> &str {
        if self.raw_abstract_text.trim().is_empty() {
            &self.abstract_text
        } else {
            &self.raw_abstract_text
        }
    }
}
