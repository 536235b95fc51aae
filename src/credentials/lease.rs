//! Client leases and the per-lane lease slot.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::credentials::{AccessToken, CredentialError};
use crate::routing::LaneId;

/// Header carrying the lane's client identifier.
pub const CLIENT_ID_HEADER: HeaderName = HeaderName::from_static("clientid");

/// A lane's credentialed view of the transport: who it is and what token it presents.
#[derive(Debug)]
pub struct ClientLease {
    lane: LaneId,
    client_id: String,
    generation: u64,
    issued_at: Instant,
    token: AccessToken,
    headers: HeaderMap,
}

impl ClientLease {
    /// Build a lease. Fails if the token or client id cannot be sent as a header.
    pub fn new(
        lane: LaneId,
        client_id: &str,
        token: AccessToken,
        generation: u64,
    ) -> Result<Self, CredentialError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_str(client_id)?);

        Ok(Self {
            lane,
            client_id: client_id.to_string(),
            generation,
            issued_at: Instant::now(),
            token,
            headers,
        })
    }

    /// Overwrite the credential headers on an outgoing request.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Count of successful refreshes on this lane when the lease was issued (1-based).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }
}

/// Holds a lane's most recent lease.
///
/// The slot keeps serving the last lease until a newer one replaces it, so a
/// failing refresh never leaves the lane without credentials once it had some.
#[derive(Debug, Default)]
pub struct LeaseSlot {
    current: ArcSwapOption<ClientLease>,
    published: Notify,
}

impl LeaseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent lease, if any was ever issued.
    pub fn current(&self) -> Option<Arc<ClientLease>> {
        self.current.load_full()
    }

    /// Swap in a new lease, returning the one it replaces.
    pub fn replace(&self, lease: ClientLease) -> Option<Arc<ClientLease>> {
        let previous = self.current.swap(Some(Arc::new(lease)));
        self.published.notify_waiters();
        previous
    }

    /// Current lease, waiting for the first one if none was issued yet.
    pub async fn wait_current(&self) -> Arc<ClientLease> {
        loop {
            // Registered before the check so a concurrent `replace` is not missed.
            let published = self.published.notified();
            if let Some(lease) = self.current() {
                return lease;
            }
            published.await;
        }
    }
}
