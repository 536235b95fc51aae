//! reqwest backed transport, for `http` and `https` targets.

use axum::body::Bytes;

use crate::credentials::ClientLease;
use crate::http::{CallResponse, RequestEnvelope, SendFuture, Transport, TransportError};

/// TLS-capable transport. Like [`HyperTransport`](crate::http::HyperTransport)
/// it holds no credentials; the lease's headers go onto each call.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(max_response_bytes: usize) -> Result<Self, TransportError> {
        // Attempt timeouts are the executor's job.
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            max_response_bytes,
        })
    }

    async fn call(
        &self,
        lease: &ClientLease,
        envelope: &RequestEnvelope,
    ) -> Result<CallResponse, TransportError> {
        let mut headers = envelope.headers().clone();
        lease.apply(&mut headers);

        let mut response = self
            .client
            .request(envelope.method().clone(), envelope.target().clone())
            .headers(headers)
            .body(envelope.body().clone())
            .send()
            .await?;

        if response
            .content_length()
            .is_some_and(|len| len > self.max_response_bytes as u64)
        {
            return Err(TransportError::BodyTooLarge(self.max_response_bytes));
        }

        let status = response.status();
        let headers = response.headers().clone();
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(TransportError::BodyTooLarge(self.max_response_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(CallResponse::new(status, headers, Bytes::from(body)))
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(&'a self, lease: &'a ClientLease, envelope: &'a RequestEnvelope) -> SendFuture<'a> {
        Box::pin(self.call(lease, envelope))
    }

    fn supports_scheme(&self, scheme: &str) -> bool {
        matches!(scheme, "http" | "https")
    }
}
