//! Admission subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline::submit(envelope, caller, completion, timeout)
//!     → deadline.rs (stamp absolute deadline = now + timeout)
//!     → buffer.rs (bounded queue; block or drop-oldest when full)
//!     → routing::Dispatcher pops, checks the deadline, routes to a lane
//! ```
//!
//! # Design Decisions
//! - Deadline is fixed at admission, before waiting for buffer space
//! - Every admitted request gets exactly one outcome, evicted ones included
//! - The buffer is the only structure shared across lanes

pub mod buffer;
pub mod deadline;

pub use buffer::AdmissionBuffer;
pub use deadline::{Deadline, DeadlinedRequest};

use crate::completion::{self, CompletionHandle, Outcome};

/// How a request got into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Space was available.
    Accepted,
    /// Admitted after waiting for space.
    Backpressured,
    /// Admitted by evicting the oldest pending request.
    EvictedOldest,
}

impl Admission {
    pub fn label(&self) -> &'static str {
        match self {
            Admission::Accepted => "accepted",
            Admission::Backpressured => "backpressured",
            Admission::EvictedOldest => "evicted",
        }
    }
}

/// Admission failure. The only case is a pipeline that is shutting down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("pipeline is shut down and no longer admits requests")]
    Closed,
}

/// An admitted request travelling through the pipeline with its completion handle.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: DeadlinedRequest,
    completion: CompletionHandle,
}

impl PendingRequest {
    pub fn new(request: DeadlinedRequest, completion: CompletionHandle) -> Self {
        Self { request, completion }
    }

    /// Report the terminal outcome to the caller.
    pub fn complete(self, outcome: Outcome) {
        completion::deliver(self.completion, outcome);
    }
}
