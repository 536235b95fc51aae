//! Per-lane credential refresh loop.
//!
//! # Responsibilities
//! - Fetch a token immediately, then on every refresh tick
//! - Publish each fresh lease into the lane's slot
//! - On a failed or timed out fetch, tear the loop down and restart it after a
//!   jittered exponential delay
//!
//! # Design Decisions
//! - Failures stay inside the lane; callers only ever see the last good lease
//! - The restart counter resets once a restarted loop issues a lease
//! - A restart starts a new ticker, so the first fetch after it is immediate

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::CredentialConfig;
use crate::credentials::{ClientLease, CredentialError, CredentialProvider, LeaseSlot};
use crate::observability::metrics;
use crate::resilience::RestartBackoff;
use crate::routing::LaneId;

/// Produces client leases for one lane for as long as the pipeline runs.
pub struct ClientSource {
    lane: LaneId,
    client_id: String,
    provider: Arc<dyn CredentialProvider>,
    slot: Arc<LeaseSlot>,
    refresh_interval: Duration,
    fetch_timeout: Duration,
    backoff: RestartBackoff,
}

impl ClientSource {
    pub fn new(
        lane: LaneId,
        client_id: impl Into<String>,
        provider: Arc<dyn CredentialProvider>,
        slot: Arc<LeaseSlot>,
        config: &CredentialConfig,
    ) -> Self {
        Self {
            lane,
            client_id: client_id.into(),
            provider,
            slot,
            refresh_interval: config.refresh_interval(),
            fetch_timeout: config.fetch_timeout(),
            backoff: RestartBackoff::from_config(&config.restart_backoff),
        }
    }

    pub fn slot(&self) -> &Arc<LeaseSlot> {
        &self.slot
    }

    /// Run until shutdown, restarting with backoff after every failure.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            lane = %self.lane,
            client_id = %self.client_id,
            refresh_interval = ?self.refresh_interval,
            "Client source starting"
        );

        let mut generation = 0u64;
        let mut restarts = 0u32;

        loop {
            let failure = tokio::select! {
                failure = self.produce(&mut generation, &mut restarts) => failure,
                _ = shutdown.recv() => {
                    tracing::info!(
                        lane = %self.lane,
                        "Client source received shutdown signal, exiting loop"
                    );
                    return;
                }
            };

            restarts = restarts.saturating_add(1);
            let delay = self.backoff.delay(restarts);
            tracing::warn!(
                lane = %self.lane,
                error = %failure,
                restart = restarts,
                delay = ?delay,
                has_lease = self.slot.current().is_some(),
                "Credential acquisition failed, restarting client source"
            );
            metrics::record_lane_restart(self.lane);

            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::info!(
                        lane = %self.lane,
                        "Client source received shutdown signal during backoff"
                    );
                    return;
                }
            }
        }
    }

    /// One incarnation of the refresh loop. Returns only when a fetch fails.
    async fn produce(&self, generation: &mut u64, restarts: &mut u32) -> CredentialError {
        let mut ticker = time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.refresh(*generation + 1).await {
                Ok(lease) => {
                    *generation += 1;
                    *restarts = 0;
                    tracing::debug!(
                        lane = %self.lane,
                        generation = *generation,
                        "Client lease refreshed"
                    );
                    metrics::record_credential_refresh(self.lane, true);
                    self.slot.replace(lease);
                }
                Err(e) => {
                    metrics::record_credential_refresh(self.lane, false);
                    return e;
                }
            }
        }
    }

    async fn refresh(&self, generation: u64) -> Result<ClientLease, CredentialError> {
        let token = time::timeout(self.fetch_timeout, self.provider.fetch(&self.client_id))
            .await
            .map_err(|_| CredentialError::Timeout(self.fetch_timeout))??;

        ClientLease::new(self.lane, &self.client_id, token, generation)
    }
}
