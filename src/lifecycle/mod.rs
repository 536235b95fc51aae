//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Pipeline::shutdown
//!
//! Shutdown (pipeline + shutdown.rs):
//!     Close admission → Drain lanes (bounded by grace period) → Stop client sources
//! ```
//!
//! # Design Decisions
//! - Admitted work is finished, not abandoned, unless the grace period runs out
//! - Client sources stop last so draining lanes keep valid credentials

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
