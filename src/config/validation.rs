//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject configurations the pipeline cannot run with (zero lanes, empty buffers)
//! - Validate value ranges (timeouts > 0, backoff bounds ordered, jitter in range)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before the pipeline starts; nothing is re-checked at request time

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{PipelineConfig, ProviderConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("lanes.count must be at least 1")]
    NoLanes,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("credentials.restart_backoff.min_ms ({min_ms}) exceeds max_ms ({max_ms})")]
    BackoffRange { min_ms: u64, max_ms: u64 },

    #[error("credentials.restart_backoff.jitter must be within [0, 1), got {0}")]
    Jitter(f64),

    #[error("credentials.provider.token_url `{0}` is not a valid URL")]
    TokenUrl(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.lanes.count == 0 {
        errors.push(ValidationError::NoLanes);
    }

    let positive = [
        ("lanes.queue_capacity", config.lanes.queue_capacity as u64),
        ("admission.buffer_capacity", config.admission.buffer_capacity as u64),
        ("credentials.refresh_interval_secs", config.credentials.refresh_interval_secs),
        ("credentials.fetch_timeout_secs", config.credentials.fetch_timeout_secs),
        ("executor.initial_attempt_timeout_ms", config.executor.initial_attempt_timeout_ms),
        ("executor.max_retries", u64::from(config.executor.max_retries)),
        ("executor.max_response_bytes", config.executor.max_response_bytes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let backoff = &config.credentials.restart_backoff;
    if backoff.min_ms == 0 {
        errors.push(ValidationError::Zero { field: "credentials.restart_backoff.min_ms" });
    }
    if backoff.min_ms > backoff.max_ms {
        errors.push(ValidationError::BackoffRange {
            min_ms: backoff.min_ms,
            max_ms: backoff.max_ms,
        });
    }
    if !(0.0..1.0).contains(&backoff.jitter) {
        errors.push(ValidationError::Jitter(backoff.jitter));
    }

    if let ProviderConfig::Http { token_url } = &config.credentials.provider {
        if Url::parse(token_url).is_err() {
            errors.push(ValidationError::TokenUrl(token_url.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
