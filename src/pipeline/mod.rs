//! Pipeline assembly.
//!
//! # Data Flow
//! ```text
//! Submitter::submit
//!     → AdmissionBuffer (one, shared)
//!     → Dispatcher (one task)
//!     → lane queue i (bounded mpsc) → LaneWorker i ← LeaseSlot i ← ClientSource i
//!     → CompletionHandle
//! ```
//!
//! # Design Decisions
//! - Lane count is fixed at start; the router and the lane vector agree on it
//! - Provider and transport are passed in, shared by every lane
//! - Shutdown order: close admission, drain lanes, stop client sources

pub mod runtime;

pub use runtime::{Pipeline, Submitter};

use crate::config::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {}", format_errors(.0))]
    Misconfigured(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
