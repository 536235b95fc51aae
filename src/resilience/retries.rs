//! Per-request attempt policy.
//!
//! # Responsibilities
//! - Bound the number of attempts per request
//! - Compute each attempt's timeout (exact doubling, no cap)
//! - Decide whether a received response counts as a failure
//!
//! # Design Decisions
//! - Transport errors and attempt timeouts are all retryable; none is fatal to a lane
//! - No delay between attempts; the growing timeout is the only backoff
//! - 5xx responses are successes unless `retry_on_server_error` is set

use std::time::Duration;

use axum::http::StatusCode;

use crate::config::ExecutorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPolicy {
    initial_timeout: Duration,
    max_attempts: u32,
    retry_on_server_error: bool,
    recheck_deadline: bool,
}

impl AttemptPolicy {
    pub fn new(initial_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            initial_timeout,
            max_attempts,
            retry_on_server_error: false,
            recheck_deadline: false,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            initial_timeout: config.initial_attempt_timeout(),
            max_attempts: config.max_retries,
            retry_on_server_error: config.retry_on_server_error,
            recheck_deadline: config.recheck_deadline,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Timeout of attempt `attempt` (1-based): `initial * 2^(attempt-1)`.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_timeout.saturating_mul(factor)
    }

    /// Timeouts of every attempt, in order.
    pub fn timeouts(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).map(|attempt| self.timeout_for(attempt))
    }

    /// Whether a response with this status should be retried.
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retry_on_server_error && status.is_server_error()
    }

    /// Whether the admission deadline is re-checked before each retry.
    pub fn recheck_deadline(&self) -> bool {
        self.recheck_deadline
    }
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}
