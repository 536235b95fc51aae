//! Pipeline assembly and shutdown.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::admission::{Admission, AdmissionBuffer, AdmissionError};
use crate::completion::{CompletionHandle, Outcome};
use crate::config::{validate_config, PipelineConfig, ValidationError};
use crate::credentials::{ClientLease, ClientSource, CredentialProvider, LeaseSlot};
use crate::executor::{Executor, LaneWorker};
use crate::http::{CallerId, RequestEnvelope, Transport};
use crate::lifecycle::Shutdown;
use crate::pipeline::PipelineError;
use crate::resilience::AttemptPolicy;
use crate::routing::{Dispatcher, LaneId, PartitionRouter};

/// Cheap, cloneable entry point for callers.
#[derive(Clone)]
pub struct Submitter {
    buffer: Arc<AdmissionBuffer>,
    default_timeout: Duration,
}

impl Submitter {
    /// Admit a request. Its outcome goes to `completion`, including when
    /// admission is rejected.
    pub async fn submit(
        &self,
        envelope: RequestEnvelope,
        caller: CallerId,
        completion: CompletionHandle,
        relative_timeout: Duration,
    ) -> Result<Admission, AdmissionError> {
        self.buffer.admit(envelope, caller, completion, relative_timeout).await
    }

    /// Submit with the configured admission timeout and wait for the outcome.
    pub async fn call(&self, envelope: RequestEnvelope, caller: CallerId) -> Outcome {
        let (completion, outcome) = CompletionHandle::oneshot();
        // A rejection has already delivered `Failed` through the handle.
        let _ = self.submit(envelope, caller, completion, self.default_timeout).await;
        outcome.await.unwrap_or(Outcome::Failed)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

/// A running pipeline: admission buffer, dispatcher, lanes and their client sources.
pub struct Pipeline {
    submitter: Submitter,
    router: PartitionRouter,
    slots: Vec<Arc<LeaseSlot>>,
    dispatcher: JoinHandle<()>,
    lanes: Vec<JoinHandle<()>>,
    sources: Vec<JoinHandle<()>>,
    shutdown: Shutdown,
    shutdown_grace: Duration,
}

impl Pipeline {
    /// Validate `config` and spawn every stage on the current runtime.
    pub fn start(
        config: &PipelineConfig,
        provider: Arc<dyn CredentialProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, PipelineError> {
        validate_config(config).map_err(PipelineError::Misconfigured)?;
        let lane_count = NonZeroUsize::new(config.lanes.count)
            .ok_or_else(|| PipelineError::Misconfigured(vec![ValidationError::NoLanes]))?;

        let router = PartitionRouter::new(lane_count);
        let buffer = Arc::new(AdmissionBuffer::new(
            config.admission.buffer_capacity,
            config.admission.overflow_policy,
        ));
        let policy = AttemptPolicy::from_config(&config.executor);
        let shutdown = Shutdown::new();

        let mut slots = Vec::with_capacity(lane_count.get());
        let mut senders = Vec::with_capacity(lane_count.get());
        let mut lanes = Vec::with_capacity(lane_count.get());
        let mut sources = Vec::with_capacity(lane_count.get());

        for index in 0..lane_count.get() {
            let lane = LaneId::new(index);
            let slot = Arc::new(LeaseSlot::new());

            let source = ClientSource::new(
                lane,
                config.lanes.client_id(index),
                Arc::clone(&provider),
                Arc::clone(&slot),
                &config.credentials,
            );
            sources.push(tokio::spawn(source.run(shutdown.subscribe())));

            let (tx, rx) = mpsc::channel(config.lanes.queue_capacity);
            let executor = Executor::new(lane, Arc::clone(&slot), Arc::clone(&transport), policy);
            lanes.push(tokio::spawn(LaneWorker::new(executor, rx).run()));

            senders.push(tx);
            slots.push(slot);
        }

        let dispatcher = Dispatcher::new(
            Arc::clone(&buffer),
            router,
            senders,
            config.admission.buffer_capacity,
        );
        let dispatcher = tokio::spawn(dispatcher.run());

        tracing::info!(
            lanes = lane_count.get(),
            buffer_capacity = buffer.capacity(),
            overflow_policy = ?buffer.policy(),
            admission_timeout = ?config.admission.timeout(),
            "Pipeline started"
        );

        Ok(Self {
            submitter: Submitter {
                buffer,
                default_timeout: config.admission.timeout(),
            },
            router,
            slots,
            dispatcher,
            lanes,
            sources,
            shutdown,
            shutdown_grace: config.lifecycle.shutdown_grace(),
        })
    }

    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// See [`Submitter::submit`].
    pub async fn submit(
        &self,
        envelope: RequestEnvelope,
        caller: CallerId,
        completion: CompletionHandle,
        relative_timeout: Duration,
    ) -> Result<Admission, AdmissionError> {
        self.submitter.submit(envelope, caller, completion, relative_timeout).await
    }

    /// See [`Submitter::call`].
    pub async fn call(&self, envelope: RequestEnvelope, caller: CallerId) -> Outcome {
        self.submitter.call(envelope, caller).await
    }

    pub fn lane_count(&self) -> usize {
        self.router.lane_count()
    }

    /// Lane a caller's requests are served on.
    pub fn lane_of(&self, caller: &CallerId) -> LaneId {
        self.router.route(caller)
    }

    /// The lane's current lease, if it has been issued one.
    pub fn lease(&self, lane: LaneId) -> Option<Arc<ClientLease>> {
        self.slots.get(lane.index()).and_then(|slot| slot.current())
    }

    /// Stop admitting, finish admitted work within the grace period, then
    /// stop the client sources.
    ///
    /// Requests still pending when the grace period runs out are reported `Failed`.
    pub async fn shutdown(self) {
        tracing::info!(grace = ?self.shutdown_grace, "Pipeline shutting down");
        let buffer = Arc::clone(&self.submitter.buffer);
        buffer.close();

        let mut workers = Vec::with_capacity(self.lanes.len() + 1);
        workers.push(self.dispatcher);
        workers.extend(self.lanes);
        let aborts: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();

        if time::timeout(self.shutdown_grace, join_all(workers)).await.is_err() {
            tracing::warn!(
                pending = buffer.len(),
                "Shutdown grace period elapsed, abandoning in-flight requests"
            );
            for abort in &aborts {
                abort.abort();
            }
            while let Some(pending) = buffer.pop().await {
                pending.complete(Outcome::Failed);
            }
        }

        self.shutdown.trigger();
        for result in join_all(self.sources).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Client source task failed");
            }
        }

        tracing::info!("Pipeline stopped");
    }
}
