//! Attempt loop for a single request.

use std::sync::Arc;

use tokio::time;

use crate::admission::DeadlinedRequest;
use crate::completion::Outcome;
use crate::credentials::LeaseSlot;
use crate::http::{Transport, TransportError};
use crate::observability::metrics;
use crate::resilience::AttemptPolicy;
use crate::routing::LaneId;

/// Executes requests for one lane against that lane's current lease.
pub struct Executor {
    lane: LaneId,
    slot: Arc<LeaseSlot>,
    transport: Arc<dyn Transport>,
    policy: AttemptPolicy,
}

impl Executor {
    pub fn new(
        lane: LaneId,
        slot: Arc<LeaseSlot>,
        transport: Arc<dyn Transport>,
        policy: AttemptPolicy,
    ) -> Self {
        Self {
            lane,
            slot,
            transport,
            policy,
        }
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// Run a request to its outcome.
    ///
    /// Waits for the lane's first lease if there is none yet, but no longer
    /// than the admission deadline; a request that never got a lease is
    /// `TimedOut` without any attempt.
    pub async fn serve(&self, request: &DeadlinedRequest) -> Outcome {
        if self.slot.current().is_none() {
            tracing::debug!(
                lane = %self.lane,
                request_id = %request.id(),
                "No client lease yet, waiting"
            );
            let expires_at = request.deadline().expires_at();
            let first = time::timeout_at(expires_at, self.slot.wait_current()).await;
            if first.is_err() {
                tracing::warn!(
                    lane = %self.lane,
                    request_id = %request.id(),
                    "No client lease issued before the request deadline"
                );
                return Outcome::TimedOut;
            }
        }

        self.execute(request).await
    }

    /// The retry loop: attempt `k` gets `initial * 2^(k-1)`; exhaustion is `Failed`.
    pub async fn execute(&self, request: &DeadlinedRequest) -> Outcome {
        for (index, timeout) in self.policy.timeouts().enumerate() {
            let attempt = index as u32 + 1;

            if attempt > 1 && self.policy.recheck_deadline() && request.deadline().is_overdue() {
                tracing::debug!(
                    lane = %self.lane,
                    request_id = %request.id(),
                    attempt,
                    "Deadline elapsed between attempts"
                );
                return Outcome::TimedOut;
            }

            // Re-read per attempt so a retry picks up a refreshed credential.
            let lease = self.slot.wait_current().await;
            let attempt_request = request.with_new_timeout(timeout);

            let result = time::timeout_at(
                attempt_request.deadline().expires_at(),
                self.transport.send(&lease, attempt_request.envelope()),
            )
            .await
            .unwrap_or(Err(TransportError::Timeout(timeout)));

            let error = match result {
                Ok(response) if self.policy.is_retryable_status(response.status()) => {
                    TransportError::ServerError(response.status())
                }
                Ok(response) => {
                    tracing::debug!(
                        lane = %self.lane,
                        request_id = %request.id(),
                        attempt,
                        status = %response.status(),
                        "Request completed"
                    );
                    metrics::record_attempt(self.lane, "success");
                    return Outcome::Completed(response);
                }
                Err(e) => e,
            };

            metrics::record_attempt(self.lane, "failure");
            tracing::info!(
                lane = %self.lane,
                request_id = %request.id(),
                attempt,
                timeout = ?timeout,
                lease_generation = lease.generation(),
                error = %error,
                "Attempt failed"
            );
        }

        tracing::warn!(
            lane = %self.lane,
            request_id = %request.id(),
            attempts = self.policy.max_attempts(),
            "Retries exhausted"
        );
        Outcome::Failed
    }
}
