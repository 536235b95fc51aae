//! Client source restart and lease retention, in real time.

use std::sync::Arc;
use std::time::Duration;

use outbound_lanes::routing::LaneId;
use outbound_lanes::{CallerId, CompletionHandle, Outcome, Pipeline};

mod common;
use common::{envelope, test_config, DenyClientProvider, RecordingTransport, ScriptedProvider};

fn within(gap: Duration, low_ms: u64, high_ms: u64) -> bool {
    gap >= Duration::from_millis(low_ms) && gap <= Duration::from_millis(high_ms)
}

#[tokio::test]
async fn test_provider_failures_restart_with_growing_backoff() {
    let provider = Arc::new(ScriptedProvider::failing_first(2));
    let transport = Arc::new(RecordingTransport::default());
    let mut config = test_config(1);
    config.credentials.restart_backoff.min_ms = 1000;
    config.credentials.restart_backoff.max_ms = 10_000;
    config.credentials.restart_backoff.jitter = 0.2;
    let pipeline = Pipeline::start(&config, provider.clone(), transport.clone()).unwrap();

    let result = pipeline.call(envelope("frank", 0), "frank".into()).await;
    assert!(matches!(result, Outcome::Completed(_)));

    let fetches = provider.fetches();
    assert_eq!(fetches.len(), 3);
    let first_gap = fetches[1] - fetches[0];
    let second_gap = fetches[2] - fetches[1];
    assert!(within(first_gap, 790, 1300), "first restart after {first_gap:?}");
    assert!(within(second_gap, 1590, 2500), "second restart after {second_gap:?}");

    let lease = pipeline.lease(LaneId::new(0)).expect("lease issued");
    assert_eq!(lease.generation(), 1);
    assert_eq!(lease.client_id(), "client-0");
    assert_eq!(transport.calls()[0].client_id, "client-0");

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_lease_survives_refresh_failure() {
    let provider = Arc::new(ScriptedProvider::succeeding_first(1));
    let transport = Arc::new(RecordingTransport::default());
    let mut config = test_config(1);
    config.credentials.refresh_interval_secs = 1;
    let pipeline = Pipeline::start(&config, provider.clone(), transport.clone()).unwrap();

    assert!(pipeline.call(envelope("grace", 0), "grace".into()).await.is_completed());

    // Second tick at ~1s fails; the source is now in backoff.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(provider.fetches().len() >= 2);

    let lease = pipeline.lease(LaneId::new(0)).expect("lease retained during backoff");
    assert_eq!(lease.generation(), 1);
    assert!(pipeline.call(envelope("grace", 1), "grace".into()).await.is_completed());
    assert_eq!(transport.calls().len(), 2);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_requests_wait_for_first_lease() {
    let provider = Arc::new(ScriptedProvider::failing_first(1));
    let transport = Arc::new(RecordingTransport::default());
    let mut config = test_config(1);
    config.credentials.restart_backoff.min_ms = 200;
    config.credentials.restart_backoff.max_ms = 400;
    let pipeline = Pipeline::start(&config, provider.clone(), transport.clone()).unwrap();

    let started = tokio::time::Instant::now();
    let result = pipeline.call(envelope("heidi", 0), "heidi".into()).await;

    assert!(result.is_completed());
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(provider.fetches().len(), 2);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_lane_without_credentials_does_not_stall_other_lanes() {
    let transport = Arc::new(RecordingTransport::default());
    let mut config = test_config(2);
    config.lanes.queue_capacity = 1;
    let provider = Arc::new(DenyClientProvider::new("client-0"));
    let pipeline = Pipeline::start(&config, provider, transport.clone()).unwrap();

    let caller_on = |lane: usize| {
        (0..)
            .map(|n| CallerId::new(format!("caller-{n}")))
            .find(|caller| pipeline.lane_of(caller).index() == lane)
            .unwrap()
    };
    let stalled = caller_on(0);
    let healthy = caller_on(1);

    // Fill lane 0: one waiting for a lease, one queued, one held back.
    let mut stalled_outcomes = Vec::new();
    for seq in 0..3 {
        let (completion, rx) = CompletionHandle::oneshot();
        let request = envelope(stalled.as_str(), seq);
        pipeline
            .submit(request, stalled.clone(), completion, Duration::from_secs(2))
            .await
            .unwrap();
        stalled_outcomes.push(rx);
    }

    let (completion, rx) = CompletionHandle::oneshot();
    let started = tokio::time::Instant::now();
    pipeline
        .submit(envelope(healthy.as_str(), 0), healthy.clone(), completion, Duration::from_secs(2))
        .await
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(1), rx)
        .await
        .expect("healthy lane stalled behind lane 0")
        .unwrap();
    assert!(outcome.is_completed());
    assert!(started.elapsed() < Duration::from_secs(1));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].client_id, "client-1");

    for rx in stalled_outcomes {
        assert!(matches!(rx.await.unwrap(), Outcome::TimedOut));
    }
}
