//! Outbound HTTP request pipeline with credentialed worker lanes.

pub mod admission;
pub mod completion;
pub mod config;
pub mod credentials;
pub mod executor;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod routing;

pub use admission::{Admission, AdmissionError};
pub use completion::{CompletionHandle, CompletionSink, Outcome};
pub use config::schema::PipelineConfig;
pub use http::{CallResponse, CallerId, RequestEnvelope, RequestId, Transport};
pub use lifecycle::Shutdown;
pub use pipeline::{Pipeline, PipelineError, Submitter};
