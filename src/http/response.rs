//! Response captured from a completed call.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};

/// A fully buffered upstream response, handed to the caller on completion.
#[derive(Debug, Clone)]
pub struct CallResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl CallResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self { status, headers, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
