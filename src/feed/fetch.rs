//! Source fetching with bounded retry
//!
//! Sources are fetched one at a time. A source that keeps failing (transport
//! or parse) contributes zero entries for the run and never affects the others.

use super::parser::{parse_feed, ParsedFeed};
use crate::config::{IngestConfig, ProviderConfig};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("fetch failed: {0}")]
    Other(String),
}

/// Retrieves the raw document for one source.
///
/// Abstracts over transport so ingestion can be driven by fixtures in tests.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP fetcher backed by reqwest.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(ingest: &IngestConfig, provider: &ProviderConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(ingest.timeout_secs))
            .user_agent(concat!("paperfeed/", env!("CARGO_PKG_VERSION")));
        if let Some(proxy) = &provider.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Fixed-delay retry schedule.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(ingest: &IngestConfig) -> Self {
        Self {
            attempts: ingest.retries.max(1),
            delay: Duration::from_secs(ingest.retry_backoff_secs),
        }
    }
}

/// Fetch and parse one source, retrying on any failure.
///
/// Returns `None` once the attempts are exhausted.
pub async fn fetch_source(
    fetcher: &dyn FeedFetcher,
    url: &str,
    policy: RetryPolicy,
) -> Option<ParsedFeed> {
    info!(url, "fetching source");
    for attempt in 1..=policy.attempts {
        let outcome = match fetcher.fetch(url).await {
            Ok(body) => parse_feed(&body, Utc::now()).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(parsed) => {
                info!(url, journal = %parsed.journal, entries = parsed.entries.len(), "source fetched");
                return Some(parsed);
            }
            Err(error) => {
                warn!(url, attempt, attempts = policy.attempts, %error, "source attempt failed");
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
    warn!(url, "source yielded nothing this run");
    None
}
