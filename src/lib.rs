//! paperfeed: journal RSS aggregation with cached enrichment
//!
//! Pulls a configured list of academic journal feeds into one bounded,
//! de-duplicated corpus, keeps translation/classification and abstract caches
//! current through a pluggable enrichment service, layers user corrections and
//! reading actions on top, and infers reading preferences from that feedback.
//!
//! # Core Concepts
//!
//! - **Corpus**: every retained entry, newest first, keyed by identity
//! - **Caches**: classification records keyed by raw title, abstracts keyed by identity
//! - **Overlay**: user corrections and interactions, never overwritten by the pipeline
//! - **Report**: lift-based preference scores rebuilt from the overlay on demand
//!
//! # Example
//!
//! ```
//! use paperfeed::{merge, Corpus};
//!
//! let outcome = merge(Corpus::new(), Vec::new(), 1000);
//! assert!(outcome.corpus.is_empty());
//! ```

pub mod config;
pub mod corpus;
pub mod enrich;
pub mod feed;
pub mod overlay;
pub mod pipeline;
pub mod preference;
pub mod storage;
pub mod view;

pub use config::{Config, ConfigError, DataPaths, Vocabulary};
pub use corpus::{merge, Corpus, MergeOutcome};
pub use enrich::{
    DispatchReport, EnrichmentError, EnrichmentManager, EnrichmentService, LabelVocab,
    MockEnrichmentService, OpenAiService,
};
pub use feed::{Entry, FeedFetcher, HttpFeedFetcher, KeywordQueries};
pub use pipeline::{run, RunInputs, RunSummary};
pub use storage::{Snapshot, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
