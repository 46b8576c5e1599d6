//! Enrichment: per-title classification and per-entry abstracts
//!
//! Results from the external service are cached by key and only requested
//! again when a record is missing or stale. `EnrichmentManager` owns the
//! caches and the dispatch; `EnrichmentService` is the provider seam.

mod abstracts;
mod cache;
pub mod classification;
mod manager;
mod openai;
mod service;

pub use abstracts::{AbstractRecord, AbstractSource};
pub use cache::{AbstractCache, ClassificationCache, RecordCache};
pub use classification::{
    ClassificationRecord, Label, LabelVocab, RecordShape, FALLBACK_CONFIDENCE, FALLBACK_LABEL,
};
pub use manager::{DispatchReport, EnrichmentManager};
pub use openai::{extract_doi, extract_json, OpenAiService};
pub use service::{EnrichmentError, EnrichmentService, FetchedAbstract, MockEnrichmentService};
