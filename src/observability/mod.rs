//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! admission, routing, executor, credentials, completion
//!     → logging.rs (tracing events with lane / request_id fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every event on the request path carries the request ID and lane
//! - Token values never reach a log line

pub mod logging;
pub mod metrics;
