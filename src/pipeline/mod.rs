//! Detection-to-nutrition pipeline
//!
//! Filter → size heuristic → aggregation, sequenced by the orchestrator.

pub mod aggregate;
pub mod filter;
pub mod orchestrator;
pub mod size;

use thiserror::Error;

use crate::reference::ReferenceError;
use crate::vision::VisionError;

pub use aggregate::{aggregate, count_items};
pub use filter::{filter_detections, normalize_detection, retained_indices, select_detections};
pub use orchestrator::{estimate_nutrition, NutritionPipeline, Outcome};
pub use size::{estimate_size, SizePolicy, SizeSource, LARGE_THRESHOLD, SMALL_THRESHOLD};

/// Pipeline error types
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown food class: {0}")]
    UnknownClass(String),

    #[error("Reference data error: {0}")]
    Reference(ReferenceError),

    #[error("Vision service error: {0}")]
    Vision(#[from] VisionError),
}

// Strict-mode misses keep their own variant so callers can match on them
impl From<ReferenceError> for PipelineError {
    fn from(e: ReferenceError) -> Self {
        match e {
            ReferenceError::UnknownClass(class_name) => PipelineError::UnknownClass(class_name),
            other => PipelineError::Reference(other),
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

pub(crate) fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::InvalidInput(msg.into())
}
