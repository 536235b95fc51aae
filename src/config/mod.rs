//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PipelineConfig (validated, immutable)
//!     → read once by Pipeline::start
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the pipeline starts; lane count is fixed for its lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdmissionConfig, CredentialConfig, ExecutorConfig, LaneConfig, LifecycleConfig,
    ObservabilityConfig, OverflowPolicy, PipelineConfig, ProviderConfig, RestartBackoffConfig,
    TransportKind,
};
pub use validation::{validate_config, ValidationError};
