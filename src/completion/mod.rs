//! Completion dispatch.
//!
//! # Responsibilities
//! - Define the terminal outcome of a request (Completed, Failed, TimedOut)
//! - Deliver exactly one outcome to the caller's completion handle
//!
//! # Design Decisions
//! - Delivery consumes the handle, so a second delivery does not type-check
//! - A handle dropped without delivery reports `Failed` (aborted lane, closed admission)
//! - Fire-and-forget: a caller that stopped listening is not an error

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::http::{CallResponse, RequestId};
use crate::observability::metrics;

/// Terminal result of a request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The call returned a response.
    Completed(CallResponse),
    /// Every attempt failed.
    Failed,
    /// The deadline elapsed before the request reached a lane.
    TimedOut,
}

impl Outcome {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Completed(_) => "completed",
            Outcome::Failed => "failed",
            Outcome::TimedOut => "timed_out",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    /// The response, if the request completed.
    pub fn response(&self) -> Option<&CallResponse> {
        match self {
            Outcome::Completed(response) => Some(response),
            _ => None,
        }
    }
}

/// Receiver side of [`CompletionHandle::oneshot`].
pub type OutcomeReceiver = oneshot::Receiver<Outcome>;

/// A caller that receives outcomes as messages tagged with the request ID.
pub trait CompletionSink: Send + Sync + 'static {
    fn deliver(&self, request_id: RequestId, outcome: Outcome);
}

impl CompletionSink for mpsc::UnboundedSender<(RequestId, Outcome)> {
    fn deliver(&self, request_id: RequestId, outcome: Outcome) {
        if self.send((request_id, outcome)).is_err() {
            tracing::trace!(request_id = %request_id, "Completion sink closed, outcome discarded");
        }
    }
}

enum Target {
    Oneshot(oneshot::Sender<Outcome>),
    Sink(Arc<dyn CompletionSink>),
}

impl Target {
    fn send(self, request_id: RequestId, outcome: Outcome) {
        match self {
            Target::Oneshot(tx) => {
                if tx.send(outcome).is_err() {
                    tracing::trace!(
                        request_id = %request_id,
                        "Caller stopped waiting, outcome discarded"
                    );
                }
            }
            Target::Sink(sink) => sink.deliver(request_id, outcome),
        }
    }
}

/// Reference to the caller, good for exactly one outcome.
pub struct CompletionHandle {
    request_id: RequestId,
    target: Option<Target>,
}

impl CompletionHandle {
    /// Create a handle paired with a receiver for its single outcome.
    pub fn oneshot() -> (Self, OutcomeReceiver) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            request_id: RequestId::new(),
            target: Some(Target::Oneshot(tx)),
        };
        (handle, rx)
    }

    /// Create a handle that reports to a shared sink under a fresh request ID.
    pub fn with_sink(sink: Arc<dyn CompletionSink>) -> Self {
        Self {
            request_id: RequestId::new(),
            target: Some(Target::Sink(sink)),
        }
    }

    /// ID the outcome will be tagged with. Also used in pipeline logs.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    fn deliver(mut self, outcome: Outcome) {
        if let Some(target) = self.target.take() {
            target.send(self.request_id, outcome);
        }
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            tracing::debug!(
                request_id = %self.request_id,
                "Completion handle dropped undelivered, reporting failure"
            );
            metrics::record_outcome(Outcome::Failed.kind());
            target.send(self.request_id, Outcome::Failed);
        }
    }
}

impl fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("request_id", &self.request_id)
            .field("delivered", &self.target.is_none())
            .finish()
    }
}

/// Deliver `outcome` to the caller behind `handle`.
pub fn deliver(handle: CompletionHandle, outcome: Outcome) {
    tracing::trace!(
        request_id = %handle.request_id(),
        outcome = outcome.kind(),
        "Delivering outcome"
    );
    metrics::record_outcome(outcome.kind());
    handle.deliver(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_oneshot_delivery() {
        let (handle, rx) = CompletionHandle::oneshot();
        deliver(handle, Outcome::TimedOut);
        assert!(matches!(rx.await.unwrap(), Outcome::TimedOut));
    }

    #[tokio::test]
    async fn test_dropped_handle_reports_failure() {
        let (handle, rx) = CompletionHandle::oneshot();
        drop(handle);
        assert!(matches!(rx.await.unwrap(), Outcome::Failed));
    }

    #[tokio::test]
    async fn test_sink_delivery_tagged() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink: Arc<dyn CompletionSink> = Arc::new(tx);

        let handle = CompletionHandle::with_sink(sink.clone());
        let id = handle.request_id();
        deliver(handle, Outcome::Failed);

        let (got_id, outcome) = rx.recv().await.unwrap();
        assert_eq!(got_id, id);
        assert!(matches!(outcome, Outcome::Failed));
        // Exactly one message per handle.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_delivery_to_departed_caller_is_silent() {
        let (handle, rx) = CompletionHandle::oneshot();
        drop(rx);
        deliver(handle, Outcome::Failed);
    }
}
