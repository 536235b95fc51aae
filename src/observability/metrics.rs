//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pipeline_admissions_total` (counter): admissions by result
//! - `pipeline_buffer_depth` (gauge): requests waiting in the admission buffer
//! - `pipeline_deadline_expired_total` (counter): requests dropped by the dispatcher
//! - `pipeline_outcomes_total` (counter): delivered outcomes by kind
//! - `pipeline_request_duration_seconds` (histogram): lane service time per request
//! - `pipeline_attempts_total` (counter): executor attempts by lane, result
//! - `pipeline_credential_refresh_total` (counter): token fetches by lane, result
//! - `pipeline_lane_restarts_total` (counter): client source restarts by lane
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so tests need no setup
//! - Lane labels use the `lane-N` display form

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use tokio::time::Instant;

use crate::routing::LaneId;

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 3.0, 6.0, 12.0, 30.0,
];

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), DURATION_BUCKETS)?
        .install()?;

    describe();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe() {
    describe_counter!("pipeline_admissions_total", "Requests offered to the admission buffer");
    describe_gauge!("pipeline_buffer_depth", "Requests waiting in the admission buffer");
    describe_counter!(
        "pipeline_deadline_expired_total",
        "Requests whose admission deadline elapsed before dispatch"
    );
    describe_counter!("pipeline_outcomes_total", "Outcomes delivered to callers");
    describe_histogram!(
        "pipeline_request_duration_seconds",
        "Time a lane spent serving one request"
    );
    describe_counter!("pipeline_attempts_total", "Outbound HTTP attempts");
    describe_counter!("pipeline_credential_refresh_total", "Credential fetches");
    describe_counter!("pipeline_lane_restarts_total", "Client source restarts after a failure");
}

pub fn record_admission(result: &'static str) {
    counter!("pipeline_admissions_total", "result" => result).increment(1);
}

pub fn set_buffer_depth(depth: usize) {
    gauge!("pipeline_buffer_depth").set(depth as f64);
}

pub fn record_deadline_expired() {
    counter!("pipeline_deadline_expired_total").increment(1);
}

pub fn record_outcome(kind: &'static str) {
    counter!("pipeline_outcomes_total", "outcome" => kind).increment(1);
}

pub fn record_attempt(lane: LaneId, result: &'static str) {
    counter!(
        "pipeline_attempts_total",
        "lane" => lane.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_request_duration(lane: LaneId, started: Instant) {
    histogram!("pipeline_request_duration_seconds", "lane" => lane.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_credential_refresh(lane: LaneId, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!(
        "pipeline_credential_refresh_total",
        "lane" => lane.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_lane_restart(lane: LaneId) {
    counter!("pipeline_lane_restarts_total", "lane" => lane.to_string()).increment(1);
}
