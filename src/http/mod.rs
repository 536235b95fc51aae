//! Outbound HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! RequestEnvelope (request.rs)
//!     → Transport::send(lease, envelope)
//!         → reqwest_transport.rs (default, http + https)
//!         → client.rs (hyper-util client, http only)
//!     → CallResponse (response.rs)
//! ```
//!
//! # Design Decisions
//! - The transport is a trait so lanes can be driven without a network in tests
//! - `executor.transport` picks the implementation: reqwest (TLS, default) or
//!   plain-HTTP hyper
//! - The lease supplies credentials per call; clients themselves hold no token
//! - Transport errors are not classified: every failure is retryable

pub mod client;
pub mod request;
pub mod response;
pub mod reqwest_transport;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use crate::config::{ExecutorConfig, TransportKind};
use crate::credentials::ClientLease;

pub use client::HyperTransport;
pub use reqwest_transport::ReqwestTransport;
pub use request::{CallerId, RequestEnvelope, RequestId};
pub use response::CallResponse;

/// Boxed future returned by [`Transport::send`].
pub type SendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CallResponse, TransportError>> + Send + 'a>>;

/// Something that can execute an envelope with a lane's credentials.
pub trait Transport: Send + Sync + 'static {
    /// Issue a single call. Cancellation is the caller's job.
    fn send<'a>(&'a self, lease: &'a ClientLease, envelope: &'a RequestEnvelope) -> SendFuture<'a>;

    /// Whether targets with this URL scheme can be reached at all.
    fn supports_scheme(&self, _scheme: &str) -> bool {
        true
    }
}

/// Build the transport selected in configuration.
pub fn build_transport(config: &ExecutorConfig) -> Result<Arc<dyn Transport>, TransportError> {
    let transport: Arc<dyn Transport> = match config.transport {
        TransportKind::Reqwest => Arc::new(ReqwestTransport::new(config.max_response_bytes)?),
        TransportKind::Hyper => Arc::new(HyperTransport::new(config.max_response_bytes)),
    };
    Ok(transport)
}

/// Failure of a single call attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid target URI: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),

    #[error("request could not be built: {0}")]
    Build(#[from] axum::http::Error),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("upstream request failed: {0}")]
    Request(#[source] hyper_util::client::legacy::Error),

    #[error("upstream request failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("response body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("response body could not be read: {0}")]
    Body(#[source] axum::Error),

    #[error("upstream returned {0}")]
    ServerError(StatusCode),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}
