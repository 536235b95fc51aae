//! Sequential lane worker.

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::admission::PendingRequest;
use crate::executor::Executor;
use crate::observability::metrics;

/// Drains one lane's queue, one request at a time.
pub struct LaneWorker {
    executor: Executor,
    requests: mpsc::Receiver<PendingRequest>,
}

impl LaneWorker {
    pub fn new(executor: Executor, requests: mpsc::Receiver<PendingRequest>) -> Self {
        Self { executor, requests }
    }

    /// Run until the dispatcher drops its sender and the queue is empty.
    pub async fn run(mut self) {
        let lane = self.executor.lane();
        tracing::info!(lane = %lane, "Lane worker starting");

        while let Some(pending) = self.requests.recv().await {
            let started = Instant::now();
            let outcome = self.executor.serve(&pending.request).await;

            metrics::record_request_duration(lane, started);
            tracing::debug!(
                lane = %lane,
                request_id = %pending.request.id(),
                caller = %pending.request.caller(),
                outcome = outcome.kind(),
                "Request finished"
            );
            pending.complete(outcome);
        }

        tracing::info!(lane = %lane, "Lane queue closed, worker exiting");
    }
}
