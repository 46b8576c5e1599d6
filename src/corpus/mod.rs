//! Corpus: merge engine, source-set change detection and persistence

mod fingerprint;
mod merge;
mod store;

pub use fingerprint::{detect_change, fingerprint, SourceChange};
pub use merge::{merge, Corpus, MergeOutcome};
pub use store::{load_corpus, save_corpus};
