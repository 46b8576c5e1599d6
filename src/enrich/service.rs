//! Enrichment service: the external provider behind classification,
//! translation, abstract lookup and summarization
//!
//! Two implementations:
//! - `OpenAiService`: chat completions plus Crossref / Semantic Scholar (production)
//! - `MockEnrichmentService`: preconfigured responses with call accounting (testing)

use super::abstracts::AbstractSource;
use crate::feed::Entry;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Errors from enrichment calls.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("enrichment service not available: {0}")]
    Unavailable(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("expected {expected} results, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(e: reqwest::Error) -> Self {
        EnrichmentError::Request(e.to_string())
    }
}

/// An abstract found by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAbstract {
    pub text: String,
    pub source: AbstractSource,
}

/// The enrichment provider.
///
/// Batched calls take one chunk of keys and must answer for every key;
/// the manager treats a partial answer as a failed chunk.
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Whether the provider is configured and reachable.
    async fn is_available(&self) -> bool;

    /// Classify a chunk of raw titles. Returns one raw result object per title.
    async fn classify(&self, titles: &[String]) -> Result<HashMap<String, Value>, EnrichmentError>;

    /// Translate a chunk of raw titles.
    async fn translate(&self, titles: &[String]) -> Result<HashMap<String, String>, EnrichmentError>;

    /// Find an abstract for one entry. `Ok(None)` when no source has one.
    async fn fetch_abstract(&self, entry: &Entry) -> Result<Option<FetchedAbstract>, EnrichmentError>;

    /// Condense an abstract. `Ok(None)` when the provider declines.
    async fn summarize(&self, title: &str, text: &str) -> Result<Option<String>, EnrichmentError>;
}

/// Mock service for tests. Returns preconfigured responses and counts calls.
#[derive(Debug, Default)]
pub struct MockEnrichmentService {
    available: bool,
    failing: bool,
    delay: Option<Duration>,
    classifications: HashMap<String, Value>,
    default_classification: Option<Value>,
    abstracts: HashMap<String, FetchedAbstract>,
    classify_calls: AtomicUsize,
    translate_calls: AtomicUsize,
    abstract_calls: AtomicUsize,
    summarize_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockEnrichmentService {
    /// A mock that reports as available and answers nothing until configured.
    pub fn available() -> Self {
        Self {
            available: true,
            ..Self::default()
        }
    }

    /// A mock whose every call fails as unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Every call fails with a request error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Classification result for one title.
    pub fn with_classification(mut self, title: impl Into<String>, result: Value) -> Self {
        self.classifications.insert(title.into(), result);
        self
    }

    /// Classification result for any title without its own.
    pub fn with_default_classification(mut self, result: Value) -> Self {
        self.default_classification = Some(result);
        self
    }

    /// Abstract returned for one entry identity.
    pub fn with_abstract(mut self, identity: impl Into<String>, text: impl Into<String>, source: AbstractSource) -> Self {
        self.abstracts.insert(
            identity.into(),
            FetchedAbstract {
                text: text.into(),
                source,
            },
        );
        self
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn translate_calls(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }

    pub fn abstract_calls(&self) -> usize {
        self.abstract_calls.load(Ordering::SeqCst)
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Every key sent to classify or translate, in arrival order.
    pub fn requested_titles(&self) -> Vec<String> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<(), EnrichmentError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(EnrichmentError::Unavailable(
                "mock service configured as unavailable".to_string(),
            ));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing {
            return Err(EnrichmentError::Request("mock failure".to_string()));
        }
        Ok(())
    }

    fn record_requested(&self, titles: &[String]) {
        if let Ok(mut requested) = self.requested.lock() {
            requested.extend(titles.iter().cloned());
        }
    }
}

#[async_trait]
impl EnrichmentService for MockEnrichmentService {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn classify(&self, titles: &[String]) -> Result<HashMap<String, Value>, EnrichmentError> {
        self.enter(&self.classify_calls).await?;
        self.record_requested(titles);
        Ok(titles
            .iter()
            .filter_map(|t| {
                self.classifications
                    .get(t)
                    .or(self.default_classification.as_ref())
                    .map(|v| (t.clone(), v.clone()))
            })
            .collect())
    }

    async fn translate(&self, titles: &[String]) -> Result<HashMap<String, String>, EnrichmentError> {
        self.enter(&self.translate_calls).await?;
        self.record_requested(titles);
        Ok(titles.iter().map(|t| (t.clone(), format!("译: {}", t))).collect())
    }

    async fn fetch_abstract(&self, entry: &Entry) -> Result<Option<FetchedAbstract>, EnrichmentError> {
        self.enter(&self.abstract_calls).await?;
        Ok(self.abstracts.get(&entry.identity).cloned())
    }

    async fn summarize(&self, title: &str, text: &str) -> Result<Option<String>, EnrichmentError> {
        self.enter(&self.summarize_calls).await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("Summary of {}", title)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_answers_configured_titles_only() {
        let service = MockEnrichmentService::available()
            .with_classification("A", json!({"methods": ["Survey"]}));

        let titles = vec!["A".to_string(), "B".to_string()];
        let results = service.classify(&titles).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("A"));
        assert_eq!(service.classify_calls(), 1);
        assert_eq!(service.requested_titles(), titles);
    }

    #[tokio::test]
    async fn mock_default_covers_every_title() {
        let service = MockEnrichmentService::available().with_default_classification(json!({}));
        let results = service
            .classify(&["A".to_string(), "B".to_string()])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn unavailable_mock_errors_and_still_counts() {
        let service = MockEnrichmentService::unavailable();
        assert!(!service.is_available().await);

        let err = service.translate(&["A".to_string()]).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Unavailable(_)));
        assert_eq!(service.translate_calls(), 1);
    }

    #[tokio::test]
    async fn failing_mock_returns_request_error() {
        let service = MockEnrichmentService::available().failing();
        let err = service.summarize("T", "text").await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Request(_)));
    }
}
