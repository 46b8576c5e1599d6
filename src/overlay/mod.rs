//! User overlay: manual classification corrections and interaction state
//!
//! Corrections are consulted by everything that renders classification
//! data and always win over model output. Interaction state is the implicit
//! feedback the preference engine learns from.

mod corrections;
mod interactions;
mod render;

pub use corrections::{apply_correction, clear_correction, CorrectionStore, UserCorrection};
pub use interactions::{record_interaction, Action, InteractionState, UnknownAction};
pub use render::{resolve_classification, ClassificationSource, ResolvedClassification};
