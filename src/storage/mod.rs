//! Snapshot persistence
//!
//! Every artifact (corpus, caches, interaction state, report) is stored as a
//! single file that is rewritten wholesale. The pipeline is the only writer.

mod json;
mod traits;

pub use json::{read_or_default, write_atomic, write_text_atomic};
pub use traits::{Snapshot, StorageError, StorageResult};
