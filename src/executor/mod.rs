//! Request execution subsystem.
//!
//! # Data Flow
//! ```text
//! lane queue (mpsc)
//!     → lane.rs (one request at a time)
//!     → attempt.rs
//!         wait for first lease (bounded by admission deadline)
//!         attempt k: current lease, timeout initial * 2^(k-1)
//!         success → Completed; exhausted → Failed
//!     → completion::deliver
//! ```
//!
//! # Design Decisions
//! - Strictly sequential per lane: per-caller order without locks
//! - The admission deadline is not re-checked between attempts unless
//!   `executor.recheck_deadline` is set
//! - No failure stops a lane; it moves on to its next request

pub mod attempt;
pub mod lane;

pub use attempt::Executor;
pub use lane::LaneWorker;
