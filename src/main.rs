//! Outbound request pipeline with credentialed worker lanes.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────────┐
//!                  │                      OUTBOUND LANES                           │
//!                  │                                                               │
//!   submit()       │  ┌───────────┐    ┌────────────┐    ┌────────┐   lane 0       │
//!   ───────────────┼─▶│ admission │───▶│ dispatcher │───▶│ router │──▶ executor ───┼──▶ Target
//!                  │  │  buffer   │    │ (deadline) │    │ (hash) │──▶ executor ───┼──▶ Target
//!                  │  └───────────┘    └─────┬──────┘    └────────┘   lane N-1     │
//!                  │                         │ TimedOut                  ▲          │
//!                  │                         ▼                           │ lease    │
//!   outcome        │                  ┌────────────┐           ┌────────┴───────┐  │
//!   ◀──────────────┼──────────────────│ completion │◀──────────│ client source  │◀─┼── Token
//!                  │                  │  handles   │  outcome  │ (per lane)     │  │   Provider
//!                  │                  └────────────┘           └────────────────┘  │
//!                  │                                                               │
//!                  │  ┌─────────┐ ┌──────────────┐ ┌────────────┐ ┌────────────┐  │
//!                  │  │ config  │ │ observability│ │ resilience │ │ lifecycle  │  │
//!                  │  └─────────┘ └──────────────┘ └────────────┘ └────────────┘  │
//!                  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The binary runs the pipeline with a demo load generator: `--callers`
//! simulated callers each send `GET --target` every `--interval-ms`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use url::Url;

use outbound_lanes::completion::CompletionSink;
use outbound_lanes::config::{load_config, PipelineConfig};
use outbound_lanes::credentials::build_provider;
use outbound_lanes::http::build_transport;
use outbound_lanes::lifecycle::wait_for_shutdown_signal;
use outbound_lanes::observability::{logging, metrics};
use outbound_lanes::{
    CallerId, CompletionHandle, Outcome, Pipeline, RequestEnvelope, RequestId, Shutdown, Submitter,
};

#[derive(Parser)]
#[command(name = "outbound-lanes")]
#[command(about = "Outbound HTTP pipeline with per-lane rotating credentials", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// URL the demo callers request
    #[arg(short, long, default_value = "http://localhost:5000")]
    target: Url,

    /// Number of simulated callers (0 disables the demo load)
    #[arg(long, default_value_t = 10)]
    callers: usize,

    /// Delay between two requests of the same caller
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("outbound-lanes v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        lanes = config.lanes.count,
        buffer_capacity = config.admission.buffer_capacity,
        overflow_policy = ?config.admission.overflow_policy,
        refresh_interval_secs = config.credentials.refresh_interval_secs,
        max_retries = config.executor.max_retries,
        transport = ?config.executor.transport,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let provider = build_provider(&config.credentials.provider)?;
    let transport = build_transport(&config.executor)?;
    if !transport.supports_scheme(cli.target.scheme()) {
        return Err(format!(
            "target scheme `{}` is not supported by the {:?} transport",
            cli.target.scheme(),
            config.executor.transport
        )
        .into());
    }
    let pipeline = Pipeline::start(&config, provider, transport)?;

    let demo = Shutdown::new();
    let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
    let sink: Arc<dyn CompletionSink> = Arc::new(outcomes_tx);
    let reporter = tokio::spawn(report_outcomes(outcomes_rx));

    let interval = Duration::from_millis(cli.interval_ms.max(1));
    let callers: Vec<JoinHandle<()>> = (0..cli.callers)
        .map(|n| {
            let caller = CallerId::new(format!("caller-{n}"));
            tokio::spawn(run_caller(
                caller,
                cli.target.clone(),
                interval,
                pipeline.submitter(),
                Arc::clone(&sink),
                demo.subscribe(),
            ))
        })
        .collect();
    drop(sink);

    tracing::info!(callers = callers.len(), target = %cli.target, "Demo load started");

    wait_for_shutdown_signal().await;

    demo.trigger();
    futures_util::future::join_all(callers).await;
    pipeline.shutdown().await;
    let _ = reporter.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// One simulated caller: a `GET target` tagged with its request ID every tick.
async fn run_caller(
    caller: CallerId,
    target: Url,
    interval: Duration,
    submitter: Submitter,
    sink: Arc<dyn CompletionSink>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let request_id_header = HeaderName::from_static("requestid");
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let completion = CompletionHandle::with_sink(Arc::clone(&sink));
                let mut envelope = RequestEnvelope::get(target.clone());
                if let Ok(value) = HeaderValue::from_str(&completion.request_id().to_string()) {
                    envelope = envelope.with_header(request_id_header.clone(), value);
                }

                let timeout = submitter.default_timeout();
                let submit = submitter.submit(envelope, caller.clone(), completion, timeout);
                let submitted = tokio::select! {
                    result = submit => result,
                    _ = shutdown.recv() => return,
                };
                if let Err(e) = submitted {
                    tracing::debug!(caller = %caller, error = %e, "Demo caller stopping");
                    return;
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!(caller = %caller, "Demo caller received shutdown signal");
                return;
            }
        }
    }
}

/// Log every outcome delivered to the demo sink until all senders are gone.
async fn report_outcomes(mut outcomes: mpsc::UnboundedReceiver<(RequestId, Outcome)>) {
    while let Some((request_id, outcome)) = outcomes.recv().await {
        match &outcome {
            Outcome::Completed(response) => tracing::info!(
                request_id = %request_id,
                status = %response.status(),
                bytes = response.body().len(),
                "Request completed"
            ),
            Outcome::Failed => tracing::warn!(request_id = %request_id, "Request failed"),
            Outcome::TimedOut => tracing::warn!(request_id = %request_id, "Request timed out"),
        }
    }
}
