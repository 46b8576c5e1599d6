//! Preference report assembly

use super::features::{extract_features, FeatureFamily, ItemFeatures};
use super::insights::{assess_data_quality, generate_insights, DataQuality, Insights};
use super::lift::{lift_table, preferred_and_avoided, FeatureCounts, KeyCount, LiftScore};
use super::trend::{monthly_trend, TrendBucket};
use crate::config::PreferenceConfig;
use crate::corpus::Corpus;
use crate::enrich::ClassificationCache;
use crate::feed::Entry;
use crate::overlay::{CorrectionStore, InteractionState};
use crate::storage::{write_atomic, StorageResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Scores for one feature family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyReport {
    pub family: FeatureFamily,
    pub favorite_total: u32,
    pub hidden_total: u32,
    pub distinct_keys: usize,
    pub preferred: Vec<LiftScore>,
    pub avoided: Vec<LiftScore>,
    /// Most frequent keys among positive items
    pub frequent: Vec<KeyCount>,
}

/// Interaction identities not found in the corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MissingIdentities {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

impl MissingIdentities {
    pub fn total(&self) -> usize {
        self.positive.len() + self.negative.len()
    }
}

/// Disposable report, regenerated wholesale on every computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferenceReport {
    pub generated_at: DateTime<Utc>,
    pub positive_count: usize,
    pub negative_count: usize,
    pub missing: MissingIdentities,
    pub families: Vec<FamilyReport>,
    pub trend: Vec<TrendBucket>,
    pub insights: Insights,
    pub data_quality: DataQuality,
}

/// Positive and negative identity lists derived from interaction state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledSets {
    /// (favorites ∪ archived) − hidden, first occurrence kept
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

impl LabeledSets {
    pub fn from_state(state: &InteractionState) -> Self {
        let hidden: HashSet<&str> = state.hidden.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let positive = state
            .favorites
            .iter()
            .chain(state.archived.iter())
            .filter(|id| !hidden.contains(id.as_str()) && seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        let negative = state
            .hidden
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        Self { positive, negative }
    }
}

/// Split identities into entries found in the corpus and identities missing from it.
fn resolve<'a>(ids: &[String], by_identity: &HashMap<&str, &'a Entry>) -> (Vec<&'a Entry>, Vec<String>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for id in ids {
        match by_identity.get(id.as_str()) {
            Some(entry) => found.push(*entry),
            None => missing.push(id.clone()),
        }
    }
    (found, missing)
}

/// Build the report from the corpus, interaction state and classification overlay.
pub fn build_report(
    corpus: &Corpus,
    state: &InteractionState,
    classifications: &ClassificationCache,
    corrections: &CorrectionStore,
    config: &PreferenceConfig,
) -> PreferenceReport {
    let sets = LabeledSets::from_state(state);
    let by_identity = corpus.by_identity();
    let (positive, missing_positive) = resolve(&sets.positive, &by_identity);
    let (negative, missing_negative) = resolve(&sets.negative, &by_identity);
    let missing = MissingIdentities {
        positive: missing_positive,
        negative: missing_negative,
    };
    if missing.total() > 0 {
        warn!(
            positive = missing.positive.len(),
            negative = missing.negative.len(),
            "interaction identities missing from corpus"
        );
    }

    let features = |entries: &[&Entry]| -> Vec<ItemFeatures> {
        entries
            .iter()
            .map(|e| {
                let record = classifications.get(&e.title);
                let correction = corrections.get(&e.identity);
                extract_features(e, record.as_ref(), correction.as_ref())
            })
            .collect()
    };
    let positive_features = features(&positive);
    let negative_features = features(&negative);

    let families: Vec<FamilyReport> = FeatureFamily::ALL
        .iter()
        .map(|&family| {
            let mut counts = FeatureCounts::new();
            for item in &positive_features {
                item.keys(family).into_iter().for_each(|k| counts.add_positive(k));
            }
            for item in &negative_features {
                item.keys(family).into_iter().for_each(|k| counts.add_negative(k));
            }
            let threshold = if family.is_label() {
                config.min_label_total
            } else {
                config.min_text_total
            };
            let table = lift_table(&counts, threshold);
            let (preferred, avoided) = preferred_and_avoided(&table, config.top_k);
            FamilyReport {
                family,
                favorite_total: counts.positive_total(),
                hidden_total: counts.negative_total(),
                distinct_keys: counts.distinct_keys(),
                preferred,
                avoided,
                frequent: counts.top_positive(config.top_k),
            }
        })
        .collect();

    let trend = monthly_trend(&positive, &negative, config.trend_months);
    let insights = generate_insights(&families, config.insight_min_lift);
    let data_quality = assess_data_quality(positive.len(), negative.len());

    info!(
        positive = positive.len(),
        negative = negative.len(),
        severity = ?data_quality.severity,
        "preference report built"
    );

    PreferenceReport {
        generated_at: Utc::now(),
        positive_count: positive.len(),
        negative_count: negative.len(),
        missing,
        families,
        trend,
        insights,
        data_quality,
    }
}

/// Overwrite the report artifact.
pub fn write_report(path: &Path, report: &PreferenceReport) -> StorageResult<()> {
    write_atomic(path, report)?;
    info!(path = %path.display(), "preference report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::RecordCache;
    use chrono::TimeZone;

    fn entry(id: &str, title: &str) -> Entry {
        Entry {
            title: title.into(),
            link: format!("https://j.example/{}", id),
            published_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            summary: String::new(),
            journal: "Management Science".into(),
            identity: id.into(),
        }
    }

    fn state(f: &[&str], a: &[&str], h: &[&str]) -> InteractionState {
        let v = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        InteractionState {
            favorites: v(f),
            archived: v(a),
            hidden: v(h),
        }
    }

    fn lenient() -> PreferenceConfig {
        PreferenceConfig {
            min_text_total: 1,
            min_label_total: 1,
            ..PreferenceConfig::default()
        }
    }

    #[test]
    fn positive_set_excludes_hidden_and_dedups() {
        let sets = LabeledSets::from_state(&state(&["a", "b", "c"], &["b", "d"], &["c"]));
        assert_eq!(sets.positive, vec!["a", "b", "d"]);
        assert_eq!(sets.negative, vec!["c"]);
    }

    #[test]
    fn term_lift_follows_feedback() {
        let corpus = Corpus::from_entries(
            vec![
                entry("p", "Deep Learning in Retail"),
                entry("n", "Classical Econometrics Review"),
            ],
            10,
        );
        let report = build_report(
            &corpus,
            &state(&["p"], &[], &["n"]),
            &RecordCache::in_memory(),
            &RecordCache::in_memory(),
            &lenient(),
        );

        let terms = report.families.iter().find(|f| f.family == FeatureFamily::Term).unwrap();
        let deep = terms.preferred.iter().find(|s| s.key == "deep").unwrap();
        let econometrics = terms.avoided.iter().find(|s| s.key == "econometrics").unwrap();
        assert!(deep.lift > 1.0);
        assert!(econometrics.lift < 1.0);
        assert!(terms.preferred.iter().all(|s| s.key != "econometrics"));
        assert!(terms.avoided.iter().all(|s| s.key != "deep"));
        assert_eq!(report.positive_count, 1);
        assert_eq!(report.negative_count, 1);
        assert_eq!(report.trend.len(), 1);
    }

    #[test]
    fn missing_identities_are_reported() {
        let corpus = Corpus::from_entries(vec![entry("p", "Deep Learning")], 10);
        let report = build_report(
            &corpus,
            &state(&["p", "gone"], &[], &["vanished"]),
            &RecordCache::in_memory(),
            &RecordCache::in_memory(),
            &lenient(),
        );
        assert_eq!(report.missing.positive, vec!["gone"]);
        assert_eq!(report.missing.negative, vec!["vanished"]);
        assert_eq!(report.negative_count, 0);
    }

    #[test]
    fn label_threshold_is_separate() {
        let corpus = Corpus::from_entries(vec![entry("p", "Deep Learning")], 10);
        let classifications: ClassificationCache = RecordCache::in_memory();
        classifications.insert(
            "Deep Learning",
            crate::enrich::classification::validate_result(
                &serde_json::json!({"methods": ["Experiment"], "topics": ["AI"]}),
                &crate::enrich::LabelVocab::default(),
                2,
            ),
        );
        let config = PreferenceConfig {
            min_text_total: 1,
            ..PreferenceConfig::default()
        };
        let report = build_report(
            &corpus,
            &state(&["p"], &[], &[]),
            &classifications,
            &RecordCache::in_memory(),
            &config,
        );
        let methods = report.families.iter().find(|f| f.family == FeatureFamily::Method).unwrap();
        assert!(methods.preferred.is_empty());
        assert_eq!(methods.frequent[0].key, "experiment");
    }

    #[test]
    fn empty_interactions_give_empty_but_valid_report() {
        let corpus = Corpus::from_entries(vec![entry("p", "Deep Learning")], 10);
        let report = build_report(
            &corpus,
            &InteractionState::default(),
            &RecordCache::in_memory(),
            &RecordCache::in_memory(),
            &PreferenceConfig::default(),
        );
        assert_eq!(report.families.len(), FeatureFamily::ALL.len());
        assert!(report.families.iter().all(|f| f.preferred.is_empty()));
        assert!(report.trend.is_empty());
        assert_eq!(report.insights.narratives.len(), 0);
    }
}
