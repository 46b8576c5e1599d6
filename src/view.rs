//! Live feed view (`feed.json`)
//!
//! Derived from the corpus on every run; classification is resolved
//! through the correction overlay so user fixes always show.

use crate::corpus::Corpus;
use crate::enrich::{AbstractCache, AbstractSource, ClassificationCache};
use crate::feed::{strip_illegal_xml_chars, KeywordQueries};
use crate::overlay::{resolve_classification, CorrectionStore, ResolvedClassification};
use crate::storage::{write_atomic, StorageResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbstractView {
    pub text: String,
    pub source: AbstractSource,
}

/// One rendered corpus entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub identity: String,
    /// `[journal] title`
    pub title: String,
    pub raw_title: String,
    #[serde(rename = "title_zh")]
    pub translated_title: String,
    pub link: String,
    pub summary: String,
    pub journal: String,
    /// RFC 3339
    pub published_at: String,
    #[serde(rename = "abstract")]
    pub abstract_view: Option<AbstractView>,
    pub classification: ResolvedClassification,
    pub matches_keywords: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedView {
    pub generated_at: DateTime<Utc>,
    pub keywords: Vec<String>,
    pub items: Vec<FeedItem>,
}

/// Read-only handles to everything a rendered item draws from.
pub struct ViewSources<'a> {
    pub classifications: &'a ClassificationCache,
    pub abstracts: &'a AbstractCache,
    pub corrections: &'a CorrectionStore,
}

pub fn build_view(
    corpus: &Corpus,
    queries: &KeywordQueries,
    keywords: Vec<String>,
    sources: &ViewSources<'_>,
) -> FeedView {
    let items = corpus
        .entries()
        .iter()
        .map(|entry| {
            let record = sources.classifications.get(&entry.title);
            let correction = sources.corrections.get(&entry.identity);
            let classification = resolve_classification(record.as_ref(), correction.as_ref());
            FeedItem {
                identity: entry.identity.clone(),
                title: strip_illegal_xml_chars(&entry.display_title()),
                raw_title: strip_illegal_xml_chars(&entry.title),
                translated_title: strip_illegal_xml_chars(&classification.translated_title),
                link: entry.link.clone(),
                summary: strip_illegal_xml_chars(&entry.summary),
                journal: strip_illegal_xml_chars(&entry.journal),
                published_at: entry.published_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                abstract_view: sources.abstracts.get(&entry.identity).map(|a| AbstractView {
                    text: strip_illegal_xml_chars(&a.abstract_text),
                    source: a.source,
                }),
                classification,
                matches_keywords: queries.matches(entry),
            }
        })
        .collect();

    FeedView {
        generated_at: Utc::now(),
        keywords,
        items,
    }
}

pub fn write_view(path: &Path, view: &FeedView) -> StorageResult<()> {
    write_atomic(path, view)?;
    info!(path = %path.display(), items = view.items.len(), "feed view written");
    Ok(())
}
