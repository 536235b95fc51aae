//! hyper-util backed transport.

use std::fmt;

use axum::body::Body;
use axum::http::{Request, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::credentials::ClientLease;
use crate::http::{CallResponse, RequestEnvelope, SendFuture, Transport, TransportError};

/// Plain-HTTP transport: a pooled hyper client shared by every lane.
///
/// Credentials are not baked into the client. Each call copies the lease's
/// headers onto the outgoing request, so a refreshed lease takes effect on
/// the very next attempt.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    max_response_bytes: usize,
}

impl HyperTransport {
    /// Create a transport that buffers at most `max_response_bytes` of each response.
    pub fn new(max_response_bytes: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            max_response_bytes,
        }
    }

    async fn call(
        &self,
        lease: &ClientLease,
        envelope: &RequestEnvelope,
    ) -> Result<CallResponse, TransportError> {
        let scheme = envelope.target().scheme();
        if !self.supports_scheme(scheme) {
            return Err(TransportError::UnsupportedScheme(scheme.to_string()));
        }
        let uri: Uri = envelope.target().as_str().parse()?;

        let mut builder = Request::builder().method(envelope.method().clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in envelope.headers() {
                headers.append(name.clone(), value.clone());
            }
            lease.apply(headers);
        }
        let request = builder.body(Body::from(envelope.body().clone()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(TransportError::Request)?;

        let (parts, body) = response.into_parts();
        let body = read_body(body, self.max_response_bytes).await?;

        Ok(CallResponse::new(parts.status, parts.headers, body))
    }
}

async fn read_body(body: Incoming, limit: usize) -> Result<axum::body::Bytes, TransportError> {
    axum::body::to_bytes(Body::new(body), limit)
        .await
        .map_err(TransportError::Body)
}

impl Transport for HyperTransport {
    fn send<'a>(&'a self, lease: &'a ClientLease, envelope: &'a RequestEnvelope) -> SendFuture<'a> {
        Box::pin(self.call(lease, envelope))
    }

    /// The plain connector has no TLS.
    fn supports_scheme(&self, scheme: &str) -> bool {
        scheme == "http"
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport")
            .field("max_response_bytes", &self.max_response_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    use crate::credentials::AccessToken;
    use crate::routing::LaneId;

    #[tokio::test]
    async fn test_https_target_rejected_without_connecting() {
        let transport = HyperTransport::new(1024);
        let token = AccessToken::new("t").unwrap();
        let lease = ClientLease::new(LaneId::new(0), "client-0", token, 1).unwrap();
        let envelope = RequestEnvelope::get(Url::parse("https://127.0.0.1:1/").unwrap());

        assert!(!transport.supports_scheme("https"));
        let result = transport.send(&lease, &envelope).await;
        assert!(matches!(result, Err(TransportError::UnsupportedScheme(ref s)) if s == "https"));
    }
}
