//! Top-level runs
//!
//! `run` is one ingestion pass: fingerprint the sources, fetch each one in
//! turn, merge into the corpus, export, enrich and render the view. No
//! failure escapes it; every problem is logged and counted in the returned
//! `RunSummary`.

use crate::config::{Config, DataPaths};
use crate::corpus::{detect_change, fingerprint, load_corpus, merge, save_corpus, Corpus};
use crate::enrich::{AbstractCache, ClassificationCache, DispatchReport, EnrichmentManager};
use crate::feed::{fetch_source, write_rss, FeedFetcher, KeywordQueries, RetryPolicy};
use crate::overlay::{CorrectionStore, InteractionState};
use crate::preference::{build_report, write_report, PreferenceReport};
use crate::storage::{Snapshot, StorageResult};
use crate::view::{build_view, write_view, FeedView, ViewSources};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Source list and keyword queries for one run.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub sources: Vec<String>,
    pub queries: Vec<String>,
}

impl RunInputs {
    /// Sources and queries from the environment or the configured files.
    pub fn from_config(config: &Config) -> Self {
        Self {
            sources: config.sources(),
            queries: config.queries(),
        }
    }
}

/// Counts describing one ingestion pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub sources: usize,
    pub sources_failed: usize,
    pub sources_changed: bool,
    pub fetched: usize,
    /// Items without identity dropped by the parser
    pub skipped_items: usize,
    pub added: usize,
    pub duplicates: usize,
    pub dropped: usize,
    pub corpus_size: usize,
    pub keyword_matches: usize,
    pub classification: DispatchReport,
    pub abstracts: DispatchReport,
    /// Non-fatal failures, in order
    pub errors: Vec<String>,
}

impl RunSummary {
    fn record_error(&mut self, what: &str, e: impl std::fmt::Display) {
        error!(what, error = %e, "run step failed");
        self.errors.push(format!("{}: {}", what, e));
    }
}

/// One full ingestion and enrichment pass.
pub async fn run(
    config: &Config,
    inputs: &RunInputs,
    fetcher: &dyn FeedFetcher,
    enrichment: &EnrichmentManager,
) -> RunSummary {
    let paths = config.paths();
    let mut summary = RunSummary {
        sources: inputs.sources.len(),
        ..RunSummary::default()
    };
    if inputs.sources.is_empty() {
        warn!("no sources configured");
    }

    match detect_change(&paths.fingerprint, &fingerprint(&inputs.sources)) {
        Ok(change) => summary.sources_changed = change.sources_changed(),
        Err(e) => summary.record_error("fingerprint", e),
    }

    let existing = load_corpus(&paths.corpus, config.ingest.max_items);
    let queries = KeywordQueries::parse(&inputs.queries);
    let policy = RetryPolicy::from_config(&config.ingest);

    let mut fetched = Vec::new();
    for url in &inputs.sources {
        match fetch_source(fetcher, url, policy).await {
            Some(parsed) => {
                summary.skipped_items += parsed.skipped;
                fetched.extend(parsed.entries);
            }
            None => summary.sources_failed += 1,
        }
    }
    summary.fetched = fetched.len();

    for entry in fetched.iter().filter(|e| queries.matches(e)) {
        debug!(title = %entry.title, journal = %entry.journal, "keyword match");
        summary.keyword_matches += 1;
    }

    let outcome = merge(existing, fetched, config.ingest.max_items);
    summary.added = outcome.added;
    summary.duplicates = outcome.duplicates;
    summary.dropped = outcome.dropped;
    summary.corpus_size = outcome.corpus.len();
    let corpus = outcome.corpus;
    info!(
        added = summary.added,
        duplicates = summary.duplicates,
        dropped = summary.dropped,
        size = summary.corpus_size,
        keyword_matches = summary.keyword_matches,
        "corpus merged"
    );

    if let Err(e) = save_corpus(&paths.corpus, &corpus) {
        summary.record_error("corpus", e);
    }
    if let Err(e) = write_rss(&config.rss_output, corpus.entries()) {
        summary.record_error("rss export", e);
    }

    if enrichment.service_available().await {
        summary.classification = enrichment
            .refresh_classifications(corpus.entries().iter().map(|e| e.title.as_str()))
            .await;
    } else {
        warn!("enrichment service unavailable; classifications stay stale");
    }
    if config.enrichment.fetch_abstracts {
        summary.abstracts = enrichment.refresh_abstracts(corpus.entries()).await;
    }

    if let Err(e) = render_view(&paths, &corpus, &inputs.queries, enrichment) {
        summary.record_error("feed view", e);
    }

    info!(
        sources = summary.sources,
        failed = summary.sources_failed,
        added = summary.added,
        errors = summary.errors.len(),
        "run finished"
    );
    summary
}

/// Render and write `feed.json` from the corpus and current caches.
pub fn render_view(
    paths: &DataPaths,
    corpus: &Corpus,
    queries: &[String],
    enrichment: &EnrichmentManager,
) -> StorageResult<FeedView> {
    let corrections = CorrectionStore::load(&paths.corrections);
    let view = build_view(
        corpus,
        &KeywordQueries::parse(queries),
        KeywordQueries::keywords(queries),
        &ViewSources {
            classifications: enrichment.classifications(),
            abstracts: enrichment.abstracts(),
            corrections: &corrections,
        },
    );
    write_view(&paths.feed_view, &view)?;
    Ok(view)
}

/// Rebuild the preference report from persisted state and write it.
pub fn run_report(config: &Config) -> StorageResult<PreferenceReport> {
    let paths = config.paths();
    let corpus = load_corpus(&paths.corpus, config.ingest.max_items);
    let state = InteractionState::load_or_default(&paths.interactions);
    let classifications = ClassificationCache::load_classifications(&paths.classifications);
    let corrections = CorrectionStore::load(&paths.corrections);

    let report = build_report(&corpus, &state, &classifications, &corrections, &config.preference);
    write_report(&paths.report, &report)?;
    Ok(report)
}

/// Summarize eligible abstracts, optionally only for `identities`, then re-render the view.
pub async fn run_summarize(
    config: &Config,
    queries: &[String],
    enrichment: &EnrichmentManager,
    identities: Option<&HashSet<String>>,
) -> StorageResult<DispatchReport> {
    let paths = config.paths();
    let corpus = load_corpus(&paths.corpus, config.ingest.max_items);
    let report = enrichment.summarize(corpus.entries(), identities).await;
    render_view(&paths, &corpus, queries, enrichment)?;
    Ok(report)
}

/// Re-render the view after an overlay change without touching any source.
pub fn refresh_view(config: &Config, queries: &[String]) -> StorageResult<FeedView> {
    let paths = config.paths();
    let corpus = load_corpus(&paths.corpus, config.ingest.max_items);
    let corrections = CorrectionStore::load(&paths.corrections);
    let classifications = ClassificationCache::load_classifications(&paths.classifications);
    let abstracts = AbstractCache::load(&paths.abstracts);
    let view = build_view(
        &corpus,
        &KeywordQueries::parse(queries),
        KeywordQueries::keywords(queries),
        &ViewSources {
            classifications: &classifications,
            abstracts: &abstracts,
            corrections: &corrections,
        },
    );
    write_view(&paths.feed_view, &view)?;
    Ok(view)
}
