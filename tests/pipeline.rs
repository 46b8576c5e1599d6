//! End-to-end runs against fixture feeds and the mock enrichment service.

mod common;

use common::{open_manager, read_json, rss_document, test_config, StaticFetcher};
use paperfeed::enrich::{AbstractSource, ClassificationCache};
use paperfeed::overlay::{apply_correction, record_interaction, ClassificationSource, CorrectionStore};
use paperfeed::pipeline::{refresh_view, run, run_report, run_summarize, RunInputs};
use paperfeed::MockEnrichmentService;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const JOURNAL_A: &str = "https://a.example/rss";
const JOURNAL_B: &str = "https://b.example/rss";

fn fetcher() -> StaticFetcher {
    StaticFetcher::new()
        .with_document(
            JOURNAL_A,
            rss_document(
                "Management Science",
                &[
                    ("ms-1", "Platform Pricing Under Competition", "2024-03-01T00:00:00Z", "Two-sided markets"),
                    ("ms-2", "Auction Design in Practice", "2024-02-01T00:00:00Z", "Sealed bids"),
                ],
            ),
        )
        .with_document(
            JOURNAL_B,
            rss_document(
                "Organization Science",
                &[("os-1", "Team Learning and Routines", "2024-01-01T00:00:00Z", "Field study")],
            ),
        )
}

fn inputs(sources: &[&str]) -> RunInputs {
    RunInputs {
        sources: sources.iter().map(|s| s.to_string()).collect(),
        queries: vec!["platform AND pricing".to_string()],
    }
}

fn classifying_service() -> MockEnrichmentService {
    MockEnrichmentService::available()
        .with_default_classification(json!({
            "translated_title": "译",
            "methods": ["Survey"],
            "topics": ["Platforms"],
            "novelty_score": 4
        }))
        .with_abstract("ms-1", "We study platform pricing.", AbstractSource::Crossref)
        .with_abstract("ms-2", "We study auctions.", AbstractSource::SemanticScholar)
        .with_abstract("os-1", "We study teams.", AbstractSource::Crossref)
}

#[tokio::test]
async fn full_run_ingests_enriches_and_renders() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let service = Arc::new(classifying_service());
    let manager = open_manager(&config, &service);

    let summary = run(&config, &inputs(&[JOURNAL_A, JOURNAL_B]), &fetcher(), &manager).await;

    assert_eq!(summary.sources, 2);
    assert_eq!(summary.sources_failed, 0);
    assert!(!summary.sources_changed);
    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.added, 3);
    assert_eq!(summary.corpus_size, 3);
    assert_eq!(summary.keyword_matches, 1);
    assert_eq!(summary.classification.updated, 3);
    assert_eq!(summary.abstracts.updated, 3);
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);

    let paths = config.paths();
    assert!(paths.corpus.exists());
    assert!(paths.fingerprint.exists());
    assert!(paths.classifications.exists());
    assert!(paths.abstracts.exists());
    assert!(config.rss_output.exists());

    let view = read_json(&paths.feed_view);
    let items = view["items"].as_array().unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i["identity"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["ms-1", "ms-2", "os-1"]);
    assert_eq!(view["keywords"], json!(["platform", "pricing"]));

    let first = &items[0];
    assert_eq!(first["title"], "[Management Science] Platform Pricing Under Competition");
    assert_eq!(first["title_zh"], "译");
    assert_eq!(first["matches_keywords"], true);
    assert_eq!(first["abstract"]["source"], "crossref");
    assert_eq!(first["classification"]["classification_source"], "model");
    assert_eq!(first["classification"]["methods"][0]["name"], "Survey");

    let rss = std::fs::read_to_string(&config.rss_output).unwrap();
    assert!(rss.contains("[Organization Science] Team Learning and Routines"));
}

#[tokio::test]
async fn second_run_adds_nothing_and_dispatches_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let sources = inputs(&[JOURNAL_A, JOURNAL_B]);
    let fetcher = fetcher();

    let first = Arc::new(classifying_service());
    run(&config, &sources, &fetcher, &open_manager(&config, &first)).await;
    let before = std::fs::read_to_string(config.paths().corpus).unwrap();

    // Fresh service and caches reloaded from disk
    let second = Arc::new(MockEnrichmentService::available());
    let summary = run(&config, &sources, &fetcher, &open_manager(&config, &second)).await;

    assert_eq!(summary.added, 0);
    assert_eq!(summary.duplicates, 3);
    assert_eq!(summary.corpus_size, 3);
    assert!(!summary.sources_changed);
    assert!(summary.classification.is_noop());
    assert!(summary.abstracts.is_noop());
    assert_eq!(second.classify_calls(), 0);
    assert_eq!(second.abstract_calls(), 0);
    assert_eq!(std::fs::read_to_string(config.paths().corpus).unwrap(), before);
}

#[tokio::test]
async fn failing_source_contributes_nothing_and_others_proceed() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let service = Arc::new(classifying_service());
    let fetcher = StaticFetcher::new().with_document(
        JOURNAL_A,
        rss_document("Management Science", &[("ms-1", "Platform Pricing", "2024-03-01T00:00:00Z", "")]),
    );

    let summary = run(
        &config,
        &inputs(&[JOURNAL_A, JOURNAL_B]),
        &fetcher,
        &open_manager(&config, &service),
    )
    .await;

    assert_eq!(summary.sources_failed, 1);
    assert_eq!(summary.added, 1);
    assert_eq!(fetcher.calls(JOURNAL_A), 1);
    assert_eq!(fetcher.calls(JOURNAL_B), config.ingest.retries as usize);
    assert!(summary.errors.is_empty());
}

#[tokio::test]
async fn source_change_is_flagged_and_history_kept() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let service = Arc::new(classifying_service());
    let fetcher = fetcher();

    run(&config, &inputs(&[JOURNAL_A, JOURNAL_B]), &fetcher, &open_manager(&config, &service)).await;
    let summary = run(&config, &inputs(&[JOURNAL_A]), &fetcher, &open_manager(&config, &service)).await;

    assert!(summary.sources_changed);
    assert_eq!(summary.corpus_size, 3);
}

#[tokio::test]
async fn corpus_cap_drops_oldest() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.ingest.max_items = 2;
    let service = Arc::new(classifying_service());

    let summary = run(&config, &inputs(&[JOURNAL_A, JOURNAL_B]), &fetcher(), &open_manager(&config, &service)).await;

    assert_eq!(summary.added, 3);
    assert_eq!(summary.dropped, 1);
    assert_eq!(summary.corpus_size, 2);
    let view = read_json(&config.paths().feed_view);
    assert!(view["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|i| i["identity"] != "os-1"));
}

#[tokio::test]
async fn unavailable_service_leaves_classifications_pending() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.enrichment.fetch_abstracts = false;
    let service = Arc::new(MockEnrichmentService::unavailable());

    let summary = run(&config, &inputs(&[JOURNAL_A]), &fetcher(), &open_manager(&config, &service)).await;

    assert_eq!(summary.added, 2);
    assert_eq!(service.classify_calls(), 0);
    assert!(summary.classification.is_noop());
    assert!(summary.errors.is_empty());

    let view = read_json(&config.paths().feed_view);
    assert_eq!(view["items"][0]["classification"]["classification_source"], "none");
}

#[tokio::test]
async fn translation_mode_requests_translations_only() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.enrichment.classify = false;
    config.enrichment.fetch_abstracts = false;
    let service = Arc::new(MockEnrichmentService::available());

    let summary = run(&config, &inputs(&[JOURNAL_B]), &fetcher(), &open_manager(&config, &service)).await;

    assert_eq!(summary.classification.updated, 1);
    assert_eq!(service.classify_calls(), 0);
    assert_eq!(service.translate_calls(), 1);

    let cache = ClassificationCache::load_classifications(&config.paths().classifications);
    let record = cache.get("Team Learning and Routines").unwrap();
    assert_eq!(record.translated_title, "译: Team Learning and Routines");

    let view = read_json(&config.paths().feed_view);
    assert_eq!(view["items"][0]["title_zh"], "译: Team Learning and Routines");
    assert_eq!(view["items"][0]["classification"]["classification_source"], "none");

    // Rendering again from the files on disk keeps the record translation-only
    let reloaded = refresh_view(&config, &[]).unwrap();
    assert_eq!(reloaded.items[0].classification.classification_source, ClassificationSource::None);
    assert_eq!(reloaded.items[0].translated_title, "译: Team Learning and Routines");
}

#[tokio::test]
async fn overlay_flows_into_view_and_report() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let service = Arc::new(classifying_service());
    run(&config, &inputs(&[JOURNAL_A, JOURNAL_B]), &fetcher(), &open_manager(&config, &service)).await;
    let paths = config.paths();

    let corrections = CorrectionStore::load(&paths.corrections);
    apply_correction(&corrections, "ms-2", &json!({"methods": ["Experiment"], "novelty_score": 5})).unwrap();
    let view = refresh_view(&config, &[]).unwrap();
    let corrected = view.items.iter().find(|i| i.identity == "ms-2").unwrap();
    assert_eq!(corrected.classification.methods[0].name, "Experiment");
    assert_eq!(corrected.classification.novelty_score, Some(5));

    record_interaction(&paths.interactions, "like", "ms-1").unwrap();
    record_interaction(&paths.interactions, "archive", "ms-2").unwrap();
    record_interaction(&paths.interactions, "hide", "os-1").unwrap();
    record_interaction(&paths.interactions, "like", "gone-from-corpus").unwrap();

    let report = run_report(&config).unwrap();
    assert_eq!(report.positive_count, 2);
    assert_eq!(report.negative_count, 1);
    assert_eq!(report.missing.positive, vec!["gone-from-corpus"]);
    assert!(paths.report.exists());

    // The pipeline never rewrites the overlay
    run(&config, &inputs(&[JOURNAL_A, JOURNAL_B]), &fetcher(), &open_manager(&config, &service)).await;
    let reloaded = CorrectionStore::load(&paths.corrections);
    assert_eq!(reloaded.get("ms-2").unwrap().methods[0].name, "Experiment");
}

#[tokio::test]
async fn summarize_replaces_fetched_abstracts_only() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let service = Arc::new(classifying_service());
    let manager = open_manager(&config, &service);
    run(&config, &inputs(&[JOURNAL_A, JOURNAL_B]), &fetcher(), &manager).await;
    manager.set_user_abstract("os-1", "My own notes.").unwrap();

    let report = run_summarize(&config, &[], &manager, None).await.unwrap();

    assert_eq!(report.updated, 2);
    let summarized = manager.abstracts().get("ms-1").unwrap();
    assert_eq!(summarized.source, AbstractSource::GptSummarized);
    assert_eq!(summarized.abstract_text, "Summary of Platform Pricing Under Competition");
    assert_eq!(summarized.raw_abstract_text, "We study platform pricing.");
    let user = manager.abstracts().get("os-1").unwrap();
    assert_eq!(user.source, AbstractSource::UserProvided);

    let again = run_summarize(&config, &[], &manager, None).await.unwrap();
    assert!(again.is_noop());
}
