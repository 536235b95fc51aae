//! Bounded admission buffer.
//!
//! # Responsibilities
//! - Hold admitted requests until the dispatcher hands them to a lane
//! - Apply the configured overflow policy when full
//! - Stop admitting on close while still draining what was admitted
//!
//! # Design Decisions
//! - `Block` is a semaphore with one permit per free slot; producers wait on it,
//!   never on the queue lock
//! - `DropOldest` evicts under the lock and notifies the evicted caller after it
//! - One consumer; wakeups go through `Notify::notify_one`, which stores a permit
//!   if the consumer is not parked yet

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore, TryAcquireError};

use crate::admission::{Admission, AdmissionError, DeadlinedRequest, PendingRequest};
use crate::completion::{CompletionHandle, Outcome};
use crate::config::OverflowPolicy;
use crate::http::{CallerId, RequestEnvelope};
use crate::observability::metrics;

struct State {
    queue: VecDeque<PendingRequest>,
    closed: bool,
}

/// Multi-producer, single-consumer bounded queue of admitted requests.
pub struct AdmissionBuffer {
    state: Mutex<State>,
    capacity: usize,
    policy: OverflowPolicy,
    /// Free slots under `Block`.
    space: Semaphore,
    available: Notify,
}

impl AdmissionBuffer {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            capacity,
            policy,
            space: Semaphore::new(capacity),
            available: Notify::new(),
        }
    }

    /// Stamp a request with a deadline and admit it.
    ///
    /// The deadline is computed before any wait for space, so time spent
    /// backpressured counts against it.
    pub async fn admit(
        &self,
        envelope: RequestEnvelope,
        caller: CallerId,
        completion: CompletionHandle,
        relative_timeout: Duration,
    ) -> Result<Admission, AdmissionError> {
        let request =
            DeadlinedRequest::stamp(completion.request_id(), caller, envelope, relative_timeout);
        self.push(PendingRequest::new(request, completion)).await
    }

    /// Admit an already stamped request.
    ///
    /// A rejected request still receives `Failed` on its completion handle.
    pub async fn push(&self, pending: PendingRequest) -> Result<Admission, AdmissionError> {
        let result = match self.policy {
            OverflowPolicy::Block => self.push_blocking(pending).await,
            OverflowPolicy::DropOldest => self.push_evicting(pending),
        };
        if let Ok(admission) = &result {
            metrics::record_admission(admission.label());
        }
        result
    }

    async fn push_blocking(&self, pending: PendingRequest) -> Result<Admission, AdmissionError> {
        let (permit, admission) = match self.space.try_acquire() {
            Ok(permit) => (permit, Admission::Accepted),
            Err(TryAcquireError::NoPermits) => {
                tracing::debug!(
                    request_id = %pending.request.id(),
                    "Admission buffer full, waiting for space"
                );
                match self.space.acquire().await {
                    Ok(permit) => (permit, Admission::Backpressured),
                    Err(_) => return Err(reject(pending)),
                }
            }
            Err(TryAcquireError::Closed) => return Err(reject(pending)),
        };

        let depth = {
            let mut state = self.lock();
            if state.closed {
                drop(state);
                return Err(reject(pending));
            }
            state.queue.push_back(pending);
            state.queue.len()
        };
        // Returned to the semaphore by `pop`.
        permit.forget();

        metrics::set_buffer_depth(depth);
        self.available.notify_one();
        Ok(admission)
    }

    fn push_evicting(&self, pending: PendingRequest) -> Result<Admission, AdmissionError> {
        let (evicted, depth) = {
            let mut state = self.lock();
            if state.closed {
                drop(state);
                return Err(reject(pending));
            }
            let evicted = if state.queue.len() >= self.capacity {
                state.queue.pop_front()
            } else {
                None
            };
            state.queue.push_back(pending);
            (evicted, state.queue.len())
        };

        metrics::set_buffer_depth(depth);
        self.available.notify_one();

        match evicted {
            Some(evicted) => {
                tracing::warn!(
                    request_id = %evicted.request.id(),
                    caller = %evicted.request.caller(),
                    "Admission buffer full, evicted oldest request"
                );
                evicted.complete(Outcome::TimedOut);
                Ok(Admission::EvictedOldest)
            }
            None => Ok(Admission::Accepted),
        }
    }

    /// Take the oldest admitted request, waiting if the buffer is empty.
    ///
    /// Returns `None` once the buffer is closed and drained.
    pub async fn pop(&self) -> Option<PendingRequest> {
        loop {
            let notified = self.available.notified();
            {
                let mut state = self.lock();
                if let Some(pending) = state.queue.pop_front() {
                    let depth = state.queue.len();
                    drop(state);
                    if self.policy == OverflowPolicy::Block {
                        self.space.add_permits(1);
                    }
                    metrics::set_buffer_depth(depth);
                    return Some(pending);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop admitting. Requests already admitted are still handed out by `pop`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.space.close();
        self.available.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of requests waiting for dispatch.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn reject(pending: PendingRequest) -> AdmissionError {
    tracing::debug!(request_id = %pending.request.id(), "Admission closed, rejecting request");
    pending.complete(Outcome::Failed);
    AdmissionError::Closed
}
