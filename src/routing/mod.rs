//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! AdmissionBuffer::pop()
//!     → dispatcher.rs (deadline check; overdue → TimedOut)
//!     → partition.rs (lane = hash(caller) mod N)
//!     → lane queue (bounded mpsc)
//! ```
//!
//! # Design Decisions
//! - Routing is pure and infallible; lane count is validated at startup
//! - Same caller, same lane: per-caller ordering without cross-lane locks
//! - No rebalancing; the lane set is fixed

pub mod dispatcher;
pub mod partition;

pub use dispatcher::Dispatcher;
pub use partition::{LaneId, PartitionRouter};
