//! Buffer-to-lane dispatch loop.
//!
//! # Responsibilities
//! - Drain the admission buffer in order
//! - Divert requests whose deadline elapsed while buffered or parked (`TimedOut`, no lane)
//! - Forward the rest to the lane picked by the partition router
//!
//! # Design Decisions
//! - Lane sends never block; a full lane parks its own requests in a per-lane
//!   backlog so a stalled lane (e.g. one without credentials) cannot starve the others
//! - Parked requests across all lanes are bounded; at the bound the dispatcher
//!   stops draining the buffer, which backpressures through admission
//! - Exits when the buffer is closed and every backlog is flushed; dropping the
//!   lane senders lets each lane finish its queue and stop

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::future::select_all;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{self, Instant};

use crate::admission::{AdmissionBuffer, PendingRequest};
use crate::completion::Outcome;
use crate::observability::metrics;
use crate::routing::{LaneId, PartitionRouter};

/// Requests routed to one lane that its queue could not take yet.
struct LaneBacklog {
    lane: LaneId,
    queue: mpsc::Sender<PendingRequest>,
    parked: VecDeque<PendingRequest>,
}

impl LaneBacklog {
    /// Time out overdue parked requests, then move as many as fit into the lane queue.
    fn flush(&mut self) {
        if self.parked.iter().any(|p| p.request.deadline().is_overdue()) {
            let (expired, kept): (VecDeque<_>, VecDeque<_>) = self
                .parked
                .drain(..)
                .partition(|p| p.request.deadline().is_overdue());
            self.parked = kept;
            expired.into_iter().for_each(expire);
        }

        while let Some(pending) = self.parked.pop_front() {
            match self.queue.try_send(pending) {
                Ok(()) => {}
                Err(TrySendError::Full(pending)) => {
                    self.parked.push_front(pending);
                    break;
                }
                Err(TrySendError::Closed(pending)) => {
                    tracing::warn!(
                        request_id = %pending.request.id(),
                        lane = %self.lane,
                        "Lane is gone, failing request"
                    );
                    pending.complete(Outcome::Failed);
                }
            }
        }
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.parked
            .iter()
            .map(|p| p.request.deadline().expires_at())
            .min()
    }
}

fn expire(pending: PendingRequest) {
    tracing::debug!(
        request_id = %pending.request.id(),
        caller = %pending.request.caller(),
        "Deadline elapsed before dispatch"
    );
    metrics::record_deadline_expired();
    pending.complete(Outcome::TimedOut);
}

/// Single consumer of the admission buffer.
pub struct Dispatcher {
    buffer: Arc<AdmissionBuffer>,
    router: PartitionRouter,
    lanes: Vec<LaneBacklog>,
    park_limit: usize,
}

impl Dispatcher {
    /// `lanes[i]` must feed lane `i`; one sender per lane the router knows about.
    ///
    /// At most `park_limit` requests wait in lane backlogs at any time.
    pub fn new(
        buffer: Arc<AdmissionBuffer>,
        router: PartitionRouter,
        lanes: Vec<mpsc::Sender<PendingRequest>>,
        park_limit: usize,
    ) -> Self {
        debug_assert_eq!(router.lane_count(), lanes.len());
        let lanes = lanes
            .into_iter()
            .enumerate()
            .map(|(index, queue)| LaneBacklog {
                lane: LaneId::new(index),
                queue,
                parked: VecDeque::new(),
            })
            .collect();

        Self {
            buffer,
            router,
            lanes,
            park_limit: park_limit.max(1),
        }
    }

    pub async fn run(mut self) {
        tracing::info!(lanes = self.lanes.len(), "Dispatcher starting");
        let mut buffer_drained = false;

        loop {
            self.lanes.iter_mut().for_each(LaneBacklog::flush);

            let parked = self.parked();
            if buffer_drained && parked == 0 {
                break;
            }
            let accepting = !buffer_drained && parked < self.park_limit;
            let expiry = self.lanes.iter().filter_map(LaneBacklog::next_expiry).min();

            tokio::select! {
                next = self.buffer.pop(), if accepting => match next {
                    Some(pending) => self.route(pending),
                    None => buffer_drained = true,
                },
                _ = self.lane_capacity(), if parked > 0 => {}
                _ = time::sleep_until(expiry.unwrap_or_else(Instant::now)),
                    if expiry.is_some() => {}
            }
        }

        tracing::info!("Admission buffer closed, dispatcher exiting");
    }

    fn route(&mut self, pending: PendingRequest) {
        if pending.request.deadline().is_overdue() {
            expire(pending);
            return;
        }

        let lane = self.router.route(pending.request.caller());
        tracing::trace!(request_id = %pending.request.id(), lane = %lane, "Dispatching request");
        self.lanes[lane.index()].parked.push_back(pending);
    }

    fn parked(&self) -> usize {
        self.lanes.iter().map(|lane| lane.parked.len()).sum()
    }

    /// Resolves once some lane with parked requests has queue space again.
    async fn lane_capacity(&self) {
        let waiting: Vec<_> = self
            .lanes
            .iter()
            .filter(|lane| !lane.parked.is_empty())
            .map(|lane| Box::pin(lane.queue.reserve()))
            .collect();

        if waiting.is_empty() {
            return std::future::pending().await;
        }
        // The permit is released right away; `flush` is the only sender.
        let _ = select_all(waiting).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::time::Duration;
    use url::Url;

    use crate::admission::DeadlinedRequest;
    use crate::completion::{CompletionHandle, OutcomeReceiver};
    use crate::config::OverflowPolicy;
    use crate::http::{CallerId, RequestEnvelope};

    fn pending(caller: &CallerId, timeout: Duration) -> (PendingRequest, OutcomeReceiver) {
        let (handle, rx) = CompletionHandle::oneshot();
        let envelope = RequestEnvelope::get(Url::parse("http://localhost:5000").unwrap());
        let id = handle.request_id();
        let request = DeadlinedRequest::stamp(id, caller.clone(), envelope, timeout);
        (PendingRequest::new(request, handle), rx)
    }

    fn caller_on(router: &PartitionRouter, lane: usize) -> CallerId {
        (0..)
            .map(|n| CallerId::new(format!("caller-{n}")))
            .find(|caller| router.route(caller).index() == lane)
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_lane_does_not_block_other_lanes() {
        let router = PartitionRouter::new(NonZeroUsize::new(2).unwrap());
        let buffer = Arc::new(AdmissionBuffer::new(8, OverflowPolicy::Block));
        let (full_tx, _full_rx) = mpsc::channel(1);
        let (open_tx, mut open_rx) = mpsc::channel(1);

        let stalled = caller_on(&router, 0);
        let healthy = caller_on(&router, 1);
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (p, rx) = pending(&stalled, Duration::from_secs(30));
            buffer.push(p).await.unwrap();
            receivers.push(rx);
        }
        let (p, _rx) = pending(&healthy, Duration::from_secs(30));
        buffer.push(p).await.unwrap();

        let dispatcher = Dispatcher::new(Arc::clone(&buffer), router, vec![full_tx, open_tx], 8);
        tokio::spawn(dispatcher.run());

        let forwarded = time::timeout(Duration::from_secs(1), open_rx.recv())
            .await
            .expect("lane 1 starved by lane 0")
            .unwrap();
        assert_eq!(forwarded.request.caller(), &healthy);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_parked_request_times_out() {
        let router = PartitionRouter::new(NonZeroUsize::new(1).unwrap());
        let buffer = Arc::new(AdmissionBuffer::new(8, OverflowPolicy::Block));
        let (tx, _rx) = mpsc::channel(1);
        let caller = CallerId::new("caller");

        let (queued, _queued_rx) = pending(&caller, Duration::from_millis(100));
        let (parked, parked_rx) = pending(&caller, Duration::from_millis(100));
        buffer.push(queued).await.unwrap();
        buffer.push(parked).await.unwrap();

        tokio::spawn(Dispatcher::new(Arc::clone(&buffer), router, vec![tx], 8).run());

        let outcome = time::timeout(Duration::from_secs(1), parked_rx)
            .await
            .expect("parked request never expired")
            .unwrap();
        assert!(matches!(outcome, Outcome::TimedOut));
    }
}
