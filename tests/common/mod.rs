//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;
use url::Url;

use outbound_lanes::config::PipelineConfig;
use outbound_lanes::credentials::{
    AccessToken, ClientLease, CredentialError, CredentialProvider, FetchFuture,
};
use outbound_lanes::http::{CallResponse, RequestEnvelope, SendFuture, Transport, TransportError};

pub const CALLER_HEADER: &str = "x-caller";
pub const SEQ_HEADER: &str = "x-seq";

/// Start a programmable mock backend on an ephemeral port.
///
/// `f` receives the raw request head and returns the status and body to send.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&chunk[..n]),
                    }
                }

                let (status, body) = f(String::from_utf8_lossy(&head).into_owned()).await;
                let status_text = match status {
                    200 => "200 OK",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Config with test-sized durations.
pub fn test_config(lanes: usize) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.lanes.count = lanes;
    config.admission.timeout_secs = 10;
    config.executor.initial_attempt_timeout_ms = 100;
    config.credentials.fetch_timeout_secs = 1;
    config.lifecycle.shutdown_grace_secs = 5;
    config.observability.metrics_enabled = false;
    config
}

pub fn envelope(caller: &str, seq: usize) -> RequestEnvelope {
    RequestEnvelope::get(Url::parse("http://127.0.0.1:9/").unwrap())
        .with_header(HeaderName::from_static(CALLER_HEADER), HeaderValue::from_str(caller).unwrap())
        .with_header(HeaderName::from_static(SEQ_HEADER), HeaderValue::from(seq))
}

/// One call seen by a [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub client_id: String,
    pub caller: String,
    pub seq: usize,
}

/// Answers every call with 200 after `latency`, recording which lease served it.
#[derive(Default)]
pub struct RecordingTransport {
    pub latency: Duration,
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingTransport {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn send<'a>(&'a self, lease: &'a ClientLease, envelope: &'a RequestEnvelope) -> SendFuture<'a> {
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let header = |name: &str| {
                envelope
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            };
            self.calls.lock().unwrap().push(RecordedCall {
                client_id: lease.client_id().to_string(),
                caller: header(CALLER_HEADER),
                seq: header(SEQ_HEADER).parse().unwrap_or(usize::MAX),
            });
            Ok(CallResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"ok")))
        })
    }
}

/// Never answers; every attempt runs into its timeout. Records attempt start times.
#[derive(Default)]
pub struct HangingTransport {
    pub attempts: Mutex<Vec<Instant>>,
}

impl HangingTransport {
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Transport for HangingTransport {
    fn send<'a>(
        &'a self,
        _lease: &'a ClientLease,
        _envelope: &'a RequestEnvelope,
    ) -> SendFuture<'a> {
        Box::pin(async move {
            self.attempts.lock().unwrap().push(Instant::now());
            std::future::pending::<Result<CallResponse, TransportError>>().await
        })
    }
}

/// Fails the first `failures` fetches, then keeps failing if `fail_after` is
/// reached. Records the time of every fetch.
pub struct ScriptedProvider {
    failures: u32,
    fail_after: Option<u32>,
    count: AtomicU32,
    pub fetches: Mutex<Vec<Instant>>,
}

impl ScriptedProvider {
    /// Fails `failures` times, then always succeeds.
    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures,
            fail_after: None,
            count: AtomicU32::new(0),
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Succeeds `successes` times, then always fails.
    pub fn succeeding_first(successes: u32) -> Self {
        Self {
            failures: 0,
            fail_after: Some(successes),
            count: AtomicU32::new(0),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn fetches(&self) -> Vec<Instant> {
        self.fetches.lock().unwrap().clone()
    }
}

impl CredentialProvider for ScriptedProvider {
    fn fetch<'a>(&'a self, client_id: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            self.fetches.lock().unwrap().push(Instant::now());
            let n = self.count.fetch_add(1, Ordering::SeqCst);
            let exhausted = self.fail_after.is_some_and(|limit| n >= limit);
            if n < self.failures || exhausted {
                return Err(CredentialError::Provider(format!("scripted failure #{n}")));
            }
            AccessToken::new(format!("{client_id}-token-{n}"))
        })
    }
}

/// Fails every fetch for one client id and issues tokens to the rest.
pub struct DenyClientProvider {
    denied: String,
}

impl DenyClientProvider {
    pub fn new(denied: impl Into<String>) -> Self {
        Self { denied: denied.into() }
    }
}

impl CredentialProvider for DenyClientProvider {
    fn fetch<'a>(&'a self, client_id: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            if client_id == self.denied {
                return Err(CredentialError::Provider(format!("{client_id} is not enrolled")));
            }
            AccessToken::new(format!("{client_id}-token"))
        })
    }
}
