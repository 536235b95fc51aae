//! Deadlines and deadlined requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::http::{CallerId, RequestEnvelope, RequestId};

/// Thirty years; stands in for "never" when `now + timeout` overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Absolute expiry computed from a relative timeout.
///
/// The timestamp never changes once computed. Refreshing a request means
/// building a new [`DeadlinedRequest`] with a new deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    timeout: Duration,
    expires_at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self::starting_at(Instant::now(), timeout)
    }

    /// Deadline `timeout` from `start`.
    pub fn starting_at(start: Instant, timeout: Duration) -> Self {
        let expires_at = start
            .checked_add(timeout)
            .unwrap_or_else(|| start + FAR_FUTURE);
        Self { timeout, expires_at }
    }

    /// Relative timeout this deadline was computed from.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// True once the expiry instant has been reached. A zero timeout is overdue immediately.
    pub fn is_overdue(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left before expiry, zero if already overdue.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// A request envelope wrapped with its caller and deadline.
#[derive(Debug, Clone)]
pub struct DeadlinedRequest {
    id: RequestId,
    caller: CallerId,
    envelope: Arc<RequestEnvelope>,
    deadline: Deadline,
}

impl DeadlinedRequest {
    /// Stamp an envelope with a deadline `timeout` from now.
    pub fn stamp(
        id: RequestId,
        caller: CallerId,
        envelope: RequestEnvelope,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            caller,
            envelope: Arc::new(envelope),
            deadline: Deadline::after(timeout),
        }
    }

    /// Re-wrap the same envelope with a fresh deadline.
    pub fn with_new_timeout(&self, timeout: Duration) -> Self {
        Self {
            id: self.id,
            caller: self.caller.clone(),
            envelope: Arc::clone(&self.envelope),
            deadline: Deadline::after(timeout),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn caller(&self) -> &CallerId {
        &self.caller
    }

    pub fn envelope(&self) -> &RequestEnvelope {
        &self.envelope
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }
}
