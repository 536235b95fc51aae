//! Request description and identities.
//!
//! # Responsibilities
//! - Describe an outbound call (method, target, headers, body) independent of any client
//! - Identify the caller a request belongs to (drives lane partitioning)
//! - Generate unique request IDs for tracing and correlation
//!
//! # Design Decisions
//! - Envelopes are built once and never mutated; retries share them through an `Arc`
//! - Bodies are `Bytes` so every attempt can resend them without copying

use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;
use uuid::Uuid;

/// Unique identifier for a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the raw UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of the caller a request is submitted on behalf of.
///
/// Requests sharing a caller identity are routed to the same lane and
/// complete in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(Arc<str>);

impl CallerId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CallerId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// An immutable outbound HTTP call description.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    method: Method,
    target: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestEnvelope {
    /// Create an envelope with no headers and an empty body.
    pub fn new(method: Method, target: Url) -> Self {
        Self {
            method,
            target,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for a `GET` envelope.
    pub fn get(target: Url) -> Self {
        Self::new(Method::GET, target)
    }

    /// Add a header. Repeated names are appended, not replaced.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_envelope_builder() {
        let target = Url::parse("http://localhost:5000/a").unwrap();
        let envelope = RequestEnvelope::new(Method::POST, target)
            .with_header(HeaderName::from_static("requestid"), HeaderValue::from_static("1"))
            .with_header(HeaderName::from_static("requestid"), HeaderValue::from_static("2"))
            .with_body("payload");

        assert_eq!(envelope.method(), Method::POST);
        assert_eq!(envelope.target().path(), "/a");
        assert_eq!(envelope.headers().get_all("requestid").iter().count(), 2);
        assert_eq!(envelope.body().as_ref(), b"payload");
    }

    #[test]
    fn test_caller_id_conversions() {
        let a: CallerId = "requestor-1".into();
        let b: CallerId = String::from("requestor-1").into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "requestor-1");
    }
}
