//! Narrative insights and data-quality tiers
//!
//! Presentation rules over the computed lift tables. Nothing here infers
//! new signal.

use super::features::FeatureFamily;
use super::lift::LiftScore;
use super::report::FamilyReport;
use serde::Serialize;

/// Topical areas and the keywords that select them; the first match wins.
const TOPICAL_AREAS: &[(&str, &[&str])] = &[
    (
        "AI & Machine Learning",
        &["learning", "neural", "deep", "machine", "algorithm", "artificial", "intelligence", "language model", "generative", "llm"],
    ),
    (
        "Platforms & Digital Markets",
        &["platform", "digital", "online", "marketplace", "sharing", "gig", "social media"],
    ),
    (
        "Operations & Supply Chain",
        &["supply", "inventory", "logistics", "operations", "scheduling", "queue", "fulfillment", "retail"],
    ),
    (
        "Marketing & Consumers",
        &["consumer", "marketing", "advertising", "brand", "customer", "pricing", "promotion"],
    ),
    (
        "Finance & Economics",
        &["finance", "financial", "econometric", "economic", "investment", "credit", "bank", "stock", "asset"],
    ),
    (
        "Healthcare",
        &["health", "hospital", "patient", "medical", "clinical", "care"],
    ),
    (
        "Sustainability & Energy",
        &["climate", "carbon", "energy", "sustainab", "environment", "emission"],
    ),
    (
        "Strategy & Organizations",
        &["strategy", "strategic", "firm", "innovation", "organization", "entrepreneur", "governance"],
    ),
];

/// Area for terms that match no keyword set
pub const DEFAULT_AREA: &str = "General Management";

/// Terms per area listed in the report.
const AREA_TERMS: usize = 5;

/// Topical area of one term or bigram.
pub fn topical_area(term: &str) -> &'static str {
    TOPICAL_AREAS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| term.contains(k)))
        .map_or(DEFAULT_AREA, |(area, _)| area)
}

/// Severity of the positive/hidden imbalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Severe,
    Moderate,
    Acceptable,
}

/// How trustworthy the report is given the feedback collected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub positive_count: usize,
    pub hidden_count: usize,
    /// positive / max(hidden, 1)
    pub ratio: f64,
    pub severity: Severity,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Bucket the positive/hidden ratio into a severity tier.
pub fn assess_data_quality(positive_count: usize, hidden_count: usize) -> DataQuality {
    let ratio = positive_count as f64 / hidden_count.max(1) as f64;
    let severity = if ratio < 0.1 {
        Severity::Severe
    } else if ratio < 0.3 {
        Severity::Moderate
    } else {
        Severity::Acceptable
    };

    let (warnings, recommendations) = match severity {
        Severity::Severe => (
            vec![format!(
                "Only {} favorited or archived papers against {} hidden; preferred signals are unreliable.",
                positive_count, hidden_count
            )],
            vec![
                "Favorite or archive papers you find relevant; at least one per ten hidden papers is needed.".to_string(),
                "Treat the preferred lists as provisional until more favorites are recorded.".to_string(),
            ],
        ),
        Severity::Moderate => (
            vec![format!(
                "Favorites are sparse ({} against {} hidden); low-count signals may be noise.",
                positive_count, hidden_count
            )],
            vec!["Keep favoriting relevant papers to sharpen the preferred lists.".to_string()],
        ),
        Severity::Acceptable => (Vec::new(), Vec::new()),
    };

    DataQuality {
        positive_count,
        hidden_count,
        ratio,
        severity,
        warnings,
        recommendations,
    }
}

/// Strong preferred terms grouped under one area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaSignal {
    pub area: String,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    /// Area of the strongest preferred term
    pub primary_area: String,
    pub areas: Vec<AreaSignal>,
    pub narratives: Vec<String>,
}

fn family<'a>(families: &'a [FamilyReport], which: FeatureFamily) -> Option<&'a FamilyReport> {
    families.iter().find(|f| f.family == which)
}

fn strong(scores: &[LiftScore], min_lift: f64) -> Vec<&LiftScore> {
    scores.iter().filter(|s| s.lift >= min_lift).collect()
}

fn weak(scores: &[LiftScore], min_lift: f64) -> Vec<&LiftScore> {
    scores.iter().filter(|s| s.lift <= 1.0 / min_lift).collect()
}

fn quoted(scores: &[&LiftScore], n: usize) -> String {
    scores
        .iter()
        .take(n)
        .map(|s| format!("\"{}\" ({:.1}x)", s.key, s.lift))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Narrate the signals whose lift passes `min_lift`.
pub fn generate_insights(families: &[FamilyReport], min_lift: f64) -> Insights {
    let min_lift = min_lift.max(1.0);
    let terms = family(families, FeatureFamily::Term)
        .map(|f| strong(&f.preferred, min_lift))
        .unwrap_or_default();

    let mut areas: Vec<AreaSignal> = Vec::new();
    for score in &terms {
        let area = topical_area(&score.key);
        match areas.iter_mut().find(|a| a.area == area) {
            Some(signal) if signal.terms.len() < AREA_TERMS => signal.terms.push(score.key.clone()),
            Some(_) => {}
            None => areas.push(AreaSignal {
                area: area.to_string(),
                terms: vec![score.key.clone()],
            }),
        }
    }
    let primary_area = areas
        .first()
        .map_or_else(|| DEFAULT_AREA.to_string(), |a| a.area.clone());

    let mut narratives = Vec::new();
    if let Some(first) = areas.first() {
        narratives.push(format!(
            "Your favorites lean toward {}: {}.",
            first.area,
            quoted(&terms, 3)
        ));
    }
    for (which, label) in [
        (FeatureFamily::Journal, "journals"),
        (FeatureFamily::Method, "methods"),
        (FeatureFamily::Topic, "topics"),
    ] {
        let Some(report) = family(families, which) else {
            continue;
        };
        let preferred = strong(&report.preferred, min_lift);
        if !preferred.is_empty() {
            narratives.push(format!("Preferred {}: {}.", label, quoted(&preferred, 3)));
        }
    }
    if let Some(report) = family(families, FeatureFamily::Term) {
        let avoided = weak(&report.avoided, min_lift);
        if !avoided.is_empty() {
            narratives.push(format!("You tend to hide papers about {}.", quoted(&avoided, 3)));
        }
    }

    Insights {
        primary_area,
        areas,
        narratives,
    }
}
