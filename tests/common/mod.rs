//! Shared fixtures for integration tests
//!
//! An in-memory feed fetcher serving RSS documents by URL, a fixture document
//! builder and a config rooted in a temporary directory.

#![allow(dead_code)]

use async_trait::async_trait;
use paperfeed::feed::FetchError;
use paperfeed::{Config, EnrichmentManager, EnrichmentService, FeedFetcher, LabelVocab, MockEnrichmentService};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Serves fixed documents; unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct StaticFetcher {
    documents: HashMap<String, Vec<u8>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, body: impl Into<String>) -> Self {
        self.documents.insert(url.to_string(), body.into().into_bytes());
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(url.to_string()).or_default() += 1;
        }
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Other(format!("no fixture for {}", url)))
    }
}

/// One fixture item: (guid, title, RFC 3339 date, description)
pub type FixtureItem<'a> = (&'a str, &'a str, &'a str, &'a str);

/// Minimal RSS 2.0 document for `journal`.
pub fn rss_document(journal: &str, items: &[FixtureItem<'_>]) -> String {
    let body: String = items
        .iter()
        .map(|(guid, title, date, description)| {
            format!(
                "<item><title>{title}</title><link>https://journal.example/{guid}</link>\
                 <guid>{guid}</guid><pubDate>{date}</pubDate><description>{description}</description></item>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>{journal}</title>\
         <link>https://journal.example</link><description>fixture</description>{body}</channel></rss>"
    )
}

/// Config with every artifact under `root` and no retry delay.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config {
        data_dir: root.join("web"),
        journals_file: root.join("journals.dat"),
        keywords_file: root.join("keywords.dat"),
        rss_output: root.join("filtered_feed.xml"),
        ..Config::default()
    };
    config.ingest.retries = 2;
    config.ingest.retry_backoff_secs = 0;
    config.enrichment.chunk_size = 2;
    config.enrichment.concurrency = 2;
    config
}

/// Manager whose caches are loaded from the config's data directory.
pub fn open_manager(config: &Config, service: &Arc<MockEnrichmentService>) -> EnrichmentManager {
    let service: Arc<dyn EnrichmentService> = service.clone();
    EnrichmentManager::open(
        service,
        &config.paths(),
        config.enrichment.clone(),
        LabelVocab::default(),
    )
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(path).unwrap_or_default();
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null)
}
