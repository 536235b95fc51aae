//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipeline.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the outbound pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker lane layout.
    pub lanes: LaneConfig,

    /// Admission buffer and deadline settings.
    pub admission: AdmissionConfig,

    /// Per-lane credential refresh and restart settings.
    pub credentials: CredentialConfig,

    /// Per-request attempt and retry settings.
    pub executor: ExecutorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Startup and shutdown settings.
    pub lifecycle: LifecycleConfig,
}

/// Worker lane configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Number of lanes. Fixed for the lifetime of the pipeline.
    pub count: usize,

    /// Pending requests each lane may queue behind the one in flight.
    pub queue_capacity: usize,

    /// Prefix of the client identifier sent by each lane (`{prefix}-{lane}`).
    pub client_id_prefix: String,
}

impl LaneConfig {
    /// Client identifier used by the given lane.
    pub fn client_id(&self, lane: usize) -> String {
        format!("{}-{}", self.client_id_prefix, lane)
    }
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            count: 4,
            queue_capacity: 1024,
            client_id_prefix: "client".to_string(),
        }
    }
}

/// What the admission buffer does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Suspend the admitting caller until space frees up.
    #[default]
    Block,
    /// Evict the oldest pending request (reported as timed out).
    DropOldest,
}

/// Admission buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum number of admitted requests waiting for a lane.
    pub buffer_capacity: usize,

    /// Behavior when the buffer is full.
    pub overflow_policy: OverflowPolicy,

    /// Relative deadline applied by `Pipeline::call`, in seconds.
    pub timeout_secs: u64,
}

impl AdmissionConfig {
    /// Default relative deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 10 * 1024,
            overflow_policy: OverflowPolicy::Block,
            timeout_secs: 30,
        }
    }
}

/// Credential lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Interval between credential refreshes in seconds.
    pub refresh_interval_secs: u64,

    /// Upper bound on a single provider fetch in seconds.
    pub fetch_timeout_secs: u64,

    /// Delay schedule for restarting a lane after a failed fetch.
    pub restart_backoff: RestartBackoffConfig,

    /// Where tokens come from.
    pub provider: ProviderConfig,
}

impl CredentialConfig {
    /// Refresh interval as a duration.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Fetch timeout as a duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            fetch_timeout_secs: 60,
            restart_backoff: RestartBackoffConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

/// Restart backoff for credential acquisition failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RestartBackoffConfig {
    /// Delay before the first restart in milliseconds.
    pub min_ms: u64,

    /// Cap on the un-jittered delay in milliseconds.
    pub max_ms: u64,

    /// Random factor applied to each delay (0.2 = ±20%).
    pub jitter: f64,
}

impl Default for RestartBackoffConfig {
    fn default() -> Self {
        Self {
            min_ms: 1000,
            max_ms: 10_000,
            jitter: 0.2,
        }
    }
}

/// Credential provider selection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// A fresh random token on every fetch.
    #[default]
    Random,
    /// The same token on every fetch.
    Static {
        /// Bearer token value.
        token: String,
    },
    /// Tokens issued by an HTTP token endpoint.
    Http {
        /// Endpoint receiving `{"client_id": ...}` and answering `{"access_token": ...}`.
        token_url: String,
    },
}

/// Request execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Timeout of the first attempt in milliseconds. Doubles on every retry.
    pub initial_attempt_timeout_ms: u64,

    /// Maximum number of attempts per request.
    pub max_retries: u32,

    /// Largest response body read into memory.
    pub max_response_bytes: usize,

    /// Treat 5xx responses as transient failures.
    pub retry_on_server_error: bool,

    /// Report `TimedOut` instead of retrying once the admission deadline has passed.
    pub recheck_deadline: bool,

    /// HTTP client used for outbound calls.
    pub transport: TransportKind,
}

/// Outbound HTTP client implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// reqwest with TLS; reaches `http` and `https` targets.
    #[default]
    Reqwest,
    /// hyper-util with the plain connector; `http` only.
    Hyper,
}

impl ExecutorConfig {
    /// First attempt timeout as a duration.
    pub fn initial_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_attempt_timeout_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            initial_attempt_timeout_ms: 3000,
            max_retries: 3,
            max_response_bytes: 2 * 1024 * 1024, // 2MB
            retry_on_server_error: false,
            recheck_deadline: false,
            transport: TransportKind::Reqwest,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Time allowed for queued requests to drain on shutdown.
    pub shutdown_grace_secs: u64,
}

impl LifecycleConfig {
    /// Drain grace period as a duration.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 30,
        }
    }
}
