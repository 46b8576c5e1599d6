//! Enrichment cache manager
//!
//! Finds the keys whose cached records are missing or stale, dispatches
//! them to the service in fixed-size chunks with bounded concurrency, and
//! merges results by key as chunks complete. A failed or timed-out chunk
//! changes nothing; its keys stay stale and are retried next run. The cache
//! is persisted every `checkpoint_every` merged records and once at the end.

use super::abstracts::{AbstractRecord, AbstractSource};
use super::cache::{AbstractCache, ClassificationCache, RecordCache};
use super::classification::{is_stale, validate_result, ClassificationRecord, LabelVocab};
use super::service::{EnrichmentError, EnrichmentService};
use crate::config::{DataPaths, EnrichmentConfig};
use crate::feed::Entry;
use crate::storage::StorageResult;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Keys found missing or stale
    pub pending: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
    /// Records merged into the cache
    pub updated: usize,
}

impl DispatchReport {
    pub fn is_noop(&self) -> bool {
        self.pending == 0
    }
}

/// Owns the classification and abstract caches and keeps them current.
pub struct EnrichmentManager {
    service: Arc<dyn EnrichmentService>,
    classifications: Arc<ClassificationCache>,
    abstracts: Arc<AbstractCache>,
    vocab: LabelVocab,
    config: EnrichmentConfig,
    call_timeout: Duration,
    semaphore: Arc<Semaphore>,
}

impl EnrichmentManager {
    pub fn new(
        service: Arc<dyn EnrichmentService>,
        classifications: Arc<ClassificationCache>,
        abstracts: Arc<AbstractCache>,
        config: EnrichmentConfig,
        vocab: LabelVocab,
    ) -> Self {
        Self {
            service,
            classifications,
            abstracts,
            vocab,
            call_timeout: Duration::from_secs(config.timeout_secs.max(1)),
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            config,
        }
    }

    /// Load both caches from the data directory.
    pub fn open(
        service: Arc<dyn EnrichmentService>,
        paths: &DataPaths,
        config: EnrichmentConfig,
        vocab: LabelVocab,
    ) -> Self {
        let classifications = Arc::new(ClassificationCache::load_classifications(&paths.classifications));
        let abstracts = Arc::new(AbstractCache::load(&paths.abstracts));
        Self::new(service, classifications, abstracts, config, vocab)
    }

    /// Override the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn classifications(&self) -> &ClassificationCache {
        &self.classifications
    }

    pub fn abstracts(&self) -> &AbstractCache {
        &self.abstracts
    }

    pub fn vocab(&self) -> &LabelVocab {
        &self.vocab
    }

    pub async fn service_available(&self) -> bool {
        self.service.is_available().await
    }

    /// Unique titles whose classification record must be (re)requested.
    ///
    /// With classification disabled only absent records are pending.
    pub fn pending_titles<'a>(&self, titles: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut seen = HashSet::new();
        titles
            .into_iter()
            .filter(|t| !t.trim().is_empty() && seen.insert(*t))
            .filter(|t| {
                if self.config.classify {
                    let record = self.classifications.get(t);
                    is_stale(record.as_ref(), &self.vocab, self.config.schema_version)
                } else {
                    !self.classifications.contains(t)
                }
            })
            .map(String::from)
            .collect()
    }

    /// Bring the classification cache up to date for `titles`.
    pub async fn refresh_classifications<'a>(&self, titles: impl IntoIterator<Item = &'a str>) -> DispatchReport {
        let pending = self.pending_titles(titles);
        let timeout = self.call_timeout;

        if !self.config.classify {
            return self
                .dispatch("translation", &*self.classifications, pending, move |service, chunk: Vec<String>| async move {
                    let translations = with_timeout(timeout, service.translate(&chunk)).await?;
                    ensure_complete(&chunk, |t| translations.contains_key(t))?;
                    Ok::<_, EnrichmentError>(
                        chunk
                            .into_iter()
                            .filter_map(|t| {
                                let text = translations.get(&t)?.clone();
                                Some((t, ClassificationRecord::translation_only(text)))
                            })
                            .collect(),
                    )
                })
                .await;
        }

        let version = self.config.schema_version;
        let vocab = self.vocab.clone();
        self.dispatch("classification", &*self.classifications, pending, move |service, chunk: Vec<String>| {
            let vocab = vocab.clone();
            async move {
                let results = with_timeout(timeout, service.classify(&chunk)).await?;
                ensure_complete(&chunk, |t| results.contains_key(t))?;
                Ok::<_, EnrichmentError>(
                    chunk
                        .into_iter()
                        .filter_map(|t| {
                            let record = validate_result(results.get(&t)?, &vocab, version);
                            Some((t, record))
                        })
                        .collect(),
                )
            }
        })
        .await
    }

    /// Fetch abstracts for entries that have none cached.
    pub async fn refresh_abstracts(&self, entries: &[Entry]) -> DispatchReport {
        let mut seen = HashSet::new();
        let pending: Vec<Entry> = entries
            .iter()
            .filter(|e| seen.insert(e.identity.as_str()) && !self.abstracts.contains(&e.identity))
            .cloned()
            .collect();
        let timeout = self.call_timeout;

        self.dispatch("abstract", &*self.abstracts, pending, move |service, chunk: Vec<Entry>| async move {
            let total = chunk.len();
            let mut found = Vec::new();
            let mut failures = Vec::new();
            for entry in chunk {
                match with_timeout(timeout, service.fetch_abstract(&entry)).await {
                    Ok(Some(fetched)) => {
                        found.push((entry.identity, AbstractRecord::new(fetched.text, fetched.source)))
                    }
                    Ok(None) => debug!(identity = %entry.identity, "no abstract available"),
                    Err(e) => {
                        debug!(identity = %entry.identity, error = %e, "abstract lookup failed");
                        failures.push(e);
                    }
                }
            }
            match failures.pop() {
                Some(e) if failures.len() + 1 == total => Err(e),
                _ => Ok(found),
            }
        })
        .await
    }

    /// Replace fetched abstracts with model summaries.
    ///
    /// Only runs on explicit request. `only` restricts the pass to those
    /// identities. Generated, summarized and user-provided text is never
    /// touched; the text that was summarized is retained.
    pub async fn summarize(&self, entries: &[Entry], only: Option<&HashSet<String>>) -> DispatchReport {
        let mut seen = HashSet::new();
        let pending: Vec<(String, String, AbstractRecord)> = entries
            .iter()
            .filter(|e| only.map_or(true, |ids| ids.contains(&e.identity)))
            .filter(|e| seen.insert(e.identity.as_str()))
            .filter_map(|e| {
                let record = self.abstracts.get(&e.identity)?;
                record
                    .can_summarize()
                    .then(|| (e.identity.clone(), e.title.clone(), record))
            })
            .collect();
        let timeout = self.call_timeout;

        self.dispatch(
            "summary",
            &*self.abstracts,
            pending,
            move |service, chunk: Vec<(String, String, AbstractRecord)>| async move {
                let mut out = Vec::with_capacity(chunk.len());
                for (identity, title, record) in chunk {
                    let original = record.source_text().to_string();
                    if let Some(summary) = with_timeout(timeout, service.summarize(&title, &original)).await? {
                        out.push((
                            identity,
                            AbstractRecord {
                                abstract_text: summary,
                                raw_abstract_text: original,
                                source: AbstractSource::GptSummarized,
                                fetched_at: Utc::now(),
                            },
                        ));
                    }
                }
                Ok::<_, EnrichmentError>(out)
            },
        )
        .await
    }

    /// Store a user-supplied abstract and persist the cache.
    pub fn set_user_abstract(&self, identity: &str, text: &str) -> StorageResult<AbstractRecord> {
        let record = AbstractRecord::new(text.trim(), AbstractSource::UserProvided);
        self.abstracts.insert(identity, record.clone());
        self.abstracts.save()?;
        info!(identity, "user abstract stored");
        Ok(record)
    }

    async fn dispatch<K, V, F, Fut>(
        &self,
        what: &'static str,
        cache: &RecordCache<V>,
        keys: Vec<K>,
        work: F,
    ) -> DispatchReport
    where
        K: Send + 'static,
        V: Clone + Serialize + Send + 'static,
        F: Fn(Arc<dyn EnrichmentService>, Vec<K>) -> Fut,
        Fut: Future<Output = Result<Vec<(String, V)>, EnrichmentError>> + Send + 'static,
    {
        let mut report = DispatchReport {
            pending: keys.len(),
            ..DispatchReport::default()
        };
        if keys.is_empty() {
            debug!(what, "cache current, nothing to dispatch");
            return report;
        }

        let chunk_size = self.config.chunk_size.max(1);
        let mut tasks = JoinSet::new();
        let mut keys = keys.into_iter().peekable();
        while keys.peek().is_some() {
            let chunk: Vec<K> = keys.by_ref().take(chunk_size).collect();
            report.chunks += 1;
            let semaphore = self.semaphore.clone();
            let call = work(self.service.clone(), chunk);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| EnrichmentError::Unavailable(format!("semaphore error: {}", e)))?;
                call.await
            });
        }
        info!(what, pending = report.pending, chunks = report.chunks, "dispatching enrichment");

        let checkpoint_every = self.config.checkpoint_every.max(1);
        let mut since_checkpoint = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(records)) => {
                    for (key, record) in records {
                        cache.insert(key, record);
                        report.updated += 1;
                        since_checkpoint += 1;
                    }
                    if since_checkpoint >= checkpoint_every {
                        persist(what, cache);
                        since_checkpoint = 0;
                    }
                }
                Ok(Err(e)) => {
                    report.failed_chunks += 1;
                    warn!(what, error = %e, "enrichment chunk failed");
                }
                Err(e) => {
                    report.failed_chunks += 1;
                    warn!(what, error = %e, "enrichment task aborted");
                }
            }
        }
        if since_checkpoint > 0 {
            persist(what, cache);
        }

        info!(
            what,
            updated = report.updated,
            failed_chunks = report.failed_chunks,
            "enrichment dispatch finished"
        );
        report
    }
}

fn persist<V: Clone + Serialize>(what: &str, cache: &RecordCache<V>) {
    if let Err(e) = cache.save() {
        warn!(what, error = %e, "failed to persist enrichment cache");
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, EnrichmentError>>,
) -> Result<T, EnrichmentError> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| EnrichmentError::Timeout(timeout))?
}

/// A batched answer must cover every key of its chunk.
fn ensure_complete(chunk: &[String], has: impl Fn(&String) -> bool) -> Result<(), EnrichmentError> {
    let answered = chunk.iter().filter(|k| has(k)).count();
    if answered == chunk.len() {
        Ok(())
    } else {
        Err(EnrichmentError::CountMismatch {
            expected: chunk.len(),
            actual: answered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::classification::RecordShape;
    use crate::enrich::MockEnrichmentService;
    use chrono::Utc;
    use serde_json::json;

    fn config() -> EnrichmentConfig {
        EnrichmentConfig {
            chunk_size: 10,
            concurrency: 4,
            checkpoint_every: 50,
            ..EnrichmentConfig::default()
        }
    }

    fn manager(service: Arc<MockEnrichmentService>, config: EnrichmentConfig) -> EnrichmentManager {
        EnrichmentManager::new(
            service,
            Arc::new(RecordCache::in_memory()),
            Arc::new(RecordCache::in_memory()),
            config,
            LabelVocab::default(),
        )
    }

    fn labelled() -> serde_json::Value {
        json!({
            "translated_title": "译",
            "methods": [{"name": "Survey", "confidence": 0.8}],
            "topics": [{"name": "Pricing", "confidence": 0.7}],
            "novelty_score": 3
        })
    }

    fn titles(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Title {}", i)).collect()
    }

    fn entry(id: &str) -> Entry {
        Entry {
            title: format!("Paper {}", id),
            link: format!("https://j.example/{}", id),
            published_at: Utc::now(),
            summary: String::new(),
            journal: "J".into(),
            identity: id.into(),
        }
    }

    #[tokio::test]
    async fn stale_titles_are_chunked_and_merged() {
        let service = Arc::new(MockEnrichmentService::available().with_default_classification(labelled()));
        let manager = manager(service.clone(), config());
        let titles = titles(25);

        let report = manager.refresh_classifications(titles.iter().map(String::as_str)).await;
        assert_eq!(report.pending, 25);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.updated, 25);
        assert_eq!(service.classify_calls(), 3);

        let record = manager.classifications().get("Title 7").unwrap();
        assert_eq!(record.shape, RecordShape::Structured);
        assert_eq!(record.schema_version, 2);
    }

    #[tokio::test]
    async fn current_cache_dispatches_nothing() {
        let service = Arc::new(MockEnrichmentService::available().with_default_classification(labelled()));
        let manager = manager(service.clone(), config());
        let titles = titles(12);

        manager.refresh_classifications(titles.iter().map(String::as_str)).await;
        let calls = service.classify_calls();

        let second = manager.refresh_classifications(titles.iter().map(String::as_str)).await;
        assert!(second.is_noop());
        assert_eq!(service.classify_calls(), calls);
    }

    #[tokio::test]
    async fn methods_only_answer_settles_after_one_call() {
        let service = Arc::new(
            MockEnrichmentService::available()
                .with_default_classification(json!({"methods": [{"name": "Survey", "confidence": 0.8}]})),
        );
        let manager = manager(service.clone(), config());

        let first = manager.refresh_classifications(["A"]).await;
        assert_eq!(first.updated, 1);
        for _ in 0..2 {
            let again = manager.refresh_classifications(["A"]).await;
            assert!(again.is_noop());
        }
        assert_eq!(service.classify_calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_titles_are_requested_once() {
        let service = Arc::new(MockEnrichmentService::available().with_default_classification(labelled()));
        let manager = manager(service.clone(), config());

        let report = manager.refresh_classifications(["Same", "Same", "Other"]).await;
        assert_eq!(report.pending, 2);
        assert_eq!(service.requested_titles().len(), 2);
    }

    #[tokio::test]
    async fn partial_answer_fails_only_that_chunk() {
        let mut mock = MockEnrichmentService::available();
        for t in titles(20).into_iter().filter(|t| t != "Title 13") {
            mock = mock.with_classification(t, labelled());
        }
        let service = Arc::new(mock);
        let manager = manager(service.clone(), config());
        let titles = titles(20);

        let report = manager.refresh_classifications(titles.iter().map(String::as_str)).await;
        assert_eq!(report.failed_chunks, 1);
        assert_eq!(report.updated, 10);
        assert!(manager.classifications().get("Title 13").is_none());
        assert!(manager.classifications().get("Title 12").is_none());
        assert!(manager.classifications().get("Title 3").is_some());

        assert_eq!(manager.pending_titles(titles.iter().map(String::as_str)).len(), 10);
    }

    #[tokio::test]
    async fn service_failure_leaves_cache_unchanged() {
        let service = Arc::new(MockEnrichmentService::available().failing());
        let manager = manager(service, config());

        let report = manager.refresh_classifications(["A", "B"]).await;
        assert_eq!(report.failed_chunks, 1);
        assert_eq!(report.updated, 0);
        assert!(manager.classifications().is_empty());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let service = Arc::new(
            MockEnrichmentService::available()
                .with_default_classification(labelled())
                .with_delay(Duration::from_millis(20)),
        );
        let config = EnrichmentConfig {
            chunk_size: 1,
            concurrency: 2,
            ..config()
        };
        let manager = manager(service.clone(), config);
        let titles = titles(8);

        let report = manager.refresh_classifications(titles.iter().map(String::as_str)).await;
        assert_eq!(report.updated, 8);
        assert!(service.peak_in_flight() <= 2);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let service = Arc::new(
            MockEnrichmentService::available()
                .with_default_classification(labelled())
                .with_delay(Duration::from_millis(200)),
        );
        let manager = manager(service, config()).with_call_timeout(Duration::from_millis(10));

        let report = manager.refresh_classifications(["A"]).await;
        assert_eq!(report.failed_chunks, 1);
        assert!(manager.classifications().is_empty());
    }

    #[tokio::test]
    async fn translation_mode_stores_translation_only_records() {
        let service = Arc::new(MockEnrichmentService::available());
        let config = EnrichmentConfig {
            classify: false,
            ..config()
        };
        let manager = manager(service.clone(), config);

        let report = manager.refresh_classifications(["Deep Learning"]).await;
        assert_eq!(report.updated, 1);
        assert_eq!(service.classify_calls(), 0);
        let record = manager.classifications().get("Deep Learning").unwrap();
        assert_eq!(record.shape, RecordShape::TranslationOnly);
        assert_eq!(record.translated_title, "译: Deep Learning");

        assert!(manager.refresh_classifications(["Deep Learning"]).await.is_noop());
    }

    #[tokio::test]
    async fn checkpointed_cache_lands_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let service = Arc::new(MockEnrichmentService::available().with_default_classification(labelled()));
        let config = EnrichmentConfig {
            checkpoint_every: 5,
            ..config()
        };
        let manager = EnrichmentManager::open(service, &paths, config, LabelVocab::default());
        let titles = titles(12);
        manager.refresh_classifications(titles.iter().map(String::as_str)).await;

        let reloaded = ClassificationCache::load_classifications(&paths.classifications);
        assert_eq!(reloaded.len(), 12);
    }

    #[tokio::test]
    async fn abstracts_fetched_once_and_summarize_respects_protection() {
        let service = Arc::new(
            MockEnrichmentService::available()
                .with_abstract("a", "A long fetched abstract.", AbstractSource::Crossref)
                .with_abstract("b", "Generated text.", AbstractSource::GptGenerated),
        );
        let manager = manager(service.clone(), config());
        let entries = vec![entry("a"), entry("b"), entry("c")];

        let report = manager.refresh_abstracts(&entries).await;
        assert_eq!(report.pending, 3);
        assert_eq!(report.updated, 2);

        let report = manager.summarize(&entries, None).await;
        assert_eq!(report.pending, 1);
        assert_eq!(service.summarize_calls(), 1);

        let a = manager.abstracts().get("a").unwrap();
        assert_eq!(a.source, AbstractSource::GptSummarized);
        assert_eq!(a.abstract_text, "Summary of Paper a");
        assert_eq!(a.raw_abstract_text, "A long fetched abstract.");

        let b = manager.abstracts().get("b").unwrap();
        assert_eq!(b.abstract_text, "Generated text.");

        assert!(manager.summarize(&entries, None).await.is_noop());
    }

    #[tokio::test]
    async fn user_abstract_is_never_summarized() {
        let service = Arc::new(MockEnrichmentService::available());
        let manager = manager(service.clone(), config());
        manager.set_user_abstract("a", " My own abstract. ").unwrap();

        let only: HashSet<String> = ["a".to_string()].into_iter().collect();
        let report = manager.summarize(&[entry("a")], Some(&only)).await;
        assert!(report.is_noop());
        assert_eq!(service.summarize_calls(), 0);
        assert_eq!(manager.abstracts().get("a").unwrap().abstract_text, "My own abstract.");
    }
}
