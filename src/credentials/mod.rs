//! Credential lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Per lane:
//!     source.rs ticker (immediately, then every refresh interval)
//!         → provider.rs fetch(client_id), bounded by fetch timeout
//!         → lease.rs ClientLease { Authorization: Bearer, ClientId }
//!         → LeaseSlot::replace (executor reads it on every attempt)
//!     fetch fails → restart after RestartBackoff delay
//! ```
//!
//! # Design Decisions
//! - One slot per lane; holding the last lease is explicit state, not a stream default
//! - Lease reads are lock-free (arc-swap); a refresh is a pointer swap
//! - Old leases are dropped, never closed under an in-flight request

pub mod lease;
pub mod provider;
pub mod source;

use std::time::Duration;

use axum::http::header::InvalidHeaderValue;

pub use lease::{ClientLease, LeaseSlot, CLIENT_ID_HEADER};
pub use provider::{
    build_provider, AccessToken, CredentialProvider, FetchFuture, HttpTokenProvider,
    RandomTokenProvider, StaticTokenProvider,
};
pub use source::ClientSource;

/// Failure to obtain or package a credential. Never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("token endpoint request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("token endpoint returned malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid token endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("provider returned an empty token")]
    EmptyToken,

    #[error("credential cannot be sent as a header value")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("credential provider failed: {0}")]
    Provider(String),
}
