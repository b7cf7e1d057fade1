pub mod acoustic;
pub mod danger;
pub mod heuristic;
pub mod medgemma;
pub mod narrative;
pub mod orchestrator;
pub mod provider;
pub mod rules;
pub mod safety;

pub use orchestrator::*;
pub use provider::{AiProvider, Assessment, MockAiProvider, ProviderError};

use thiserror::Error;

use crate::models::EncounterId;
use crate::storage::StorageError;

/// Errors a caller of the pipeline can actually see. Classifier and
/// narration failures are recovered internally and recorded on the result
/// (`used_fallback`, reasoning annotations) instead of surfacing here.
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("encounter not found: {0}")]
    EncounterNotFound(EncounterId),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
