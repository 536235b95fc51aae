//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request in a lane:
//!     → retries.rs (attempt k gets timeout initial * 2^(k-1), up to max attempts)
//!     → exhausted: Outcome::Failed
//!
//! Credential fetch failure in a lane:
//!     → backoff.rs (min * 2^(k-1), capped, ±jitter)
//!     → lane's client source restarts after the delay
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every call and every fetch has a deadline
//! - Jittered restart delays keep lanes from retrying the provider in lockstep
//! - Attempt timeouts grow without a cap; only the restart delay is capped

pub mod backoff;
pub mod retries;

pub use backoff::RestartBackoff;
pub use retries::AttemptPolicy;
