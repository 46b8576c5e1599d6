//! Preference inference from implicit feedback
//!
//! Favorited and archived papers form the positive set, hidden papers the
//! negative set. Each feature family (title terms and bigrams, journal,
//! `Source:` field, method and topic labels) is counted per set and scored
//! with smoothed lift; the report adds a monthly trend, narrative insights
//! and a data-quality tier. The engine never mutates the corpus or caches.

mod features;
mod insights;
mod lift;
mod report;
mod tokenize;
mod trend;

pub use features::{extract_features, extract_source_field, normalize_name, FeatureFamily, ItemFeatures};
pub use insights::{assess_data_quality, generate_insights, topical_area, AreaSignal, DataQuality, Insights, Severity};
pub use lift::{lift_table, preferred_and_avoided, score, wilson_interval, FeatureCounts, KeyCount, LiftScore};
pub use report::{build_report, write_report, FamilyReport, LabeledSets, MissingIdentities, PreferenceReport};
pub use tokenize::{bigrams, tokenize};
pub use trend::{monthly_trend, TrendBucket};
