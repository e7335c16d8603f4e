//! The single admitted-client session and its shared registry slot.
//!
//! Exactly one [`ClientSession`] may exist at a time (single-client policy,
//! by design).  The slot has one writer — the control plane, which admits
//! and evicts — and one external reader, the data plane, which only compares
//! datagram source addresses via [`SessionRegistry::active_peer_ip`].
//!
//! The lock is a `std::sync::RwLock`: every critical section is a few loads
//! or stores and the guard is never held across an await point.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// Error returned when admission would violate the single-client policy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmitError {
    #[error("another client session is already active")]
    Busy,
}

/// State of the one currently admitted client.
#[derive(Debug, Clone)]
pub struct ClientSession {
    /// Display name from the handshake, ≤32 bytes.
    pub name: String,
    /// Peer address of the control connection; datagram senders must match
    /// its IP.
    pub address: SocketAddr,
    /// Protocol version negotiated at handshake.
    pub protocol_version: u16,
    /// Random identifier for this admission; never crosses the wire.
    pub session_id: Uuid,
    pub connected_at: Instant,
    /// Updated on every received pong; drives keepalive eviction.
    pub last_pong: Instant,
}

/// Shared handle to the single session slot.
///
/// Cheap to clone; all clones observe the same slot.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Option<ClientSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a client, creating the session atomically.
    ///
    /// # Errors
    ///
    /// Returns [`AdmitError::Busy`] without touching the existing session
    /// when one is already active.
    pub fn admit(
        &self,
        name: String,
        address: SocketAddr,
        protocol_version: u16,
    ) -> Result<Uuid, AdmitError> {
        let mut slot = self.inner.write().expect("session lock poisoned");
        if slot.is_some() {
            return Err(AdmitError::Busy);
        }
        let session_id = Uuid::new_v4();
        let now = Instant::now();
        *slot = Some(ClientSession {
            name,
            address,
            protocol_version,
            session_id,
            connected_at: now,
            last_pong: now,
        });
        Ok(session_id)
    }

    /// Removes the session, but only if it is still the one identified by
    /// `session_id`.  Returns the evicted session, if any.
    ///
    /// The id check makes eviction idempotent: a stale connection cleaning
    /// up after itself cannot tear down a newer client's session.
    pub fn evict(&self, session_id: Uuid) -> Option<ClientSession> {
        let mut slot = self.inner.write().expect("session lock poisoned");
        if slot.as_ref().is_some_and(|s| s.session_id == session_id) {
            slot.take()
        } else {
            None
        }
    }

    /// Records a received pong.  Pongs for a session that is no longer
    /// active are ignored harmlessly.
    pub fn touch_pong(&self, session_id: Uuid, now: Instant) {
        let mut slot = self.inner.write().expect("session lock poisoned");
        if let Some(session) = slot.as_mut() {
            if session.session_id == session_id {
                session.last_pong = now;
            }
        }
    }

    /// Timestamp of the last pong for the identified session.
    pub fn last_pong(&self, session_id: Uuid) -> Option<Instant> {
        let slot = self.inner.read().expect("session lock poisoned");
        slot.as_ref()
            .filter(|s| s.session_id == session_id)
            .map(|s| s.last_pong)
    }

    /// IP of the currently admitted client, read by the data plane.
    ///
    /// This is the data plane's entire authentication mechanism: source-IP
    /// equality with the control-plane-admitted peer.  Known v1 weakness
    /// (spoofing, multiple devices behind one NAT address) — preserved, not
    /// hardened.
    pub fn active_peer_ip(&self) -> Option<IpAddr> {
        let slot = self.inner.read().expect("session lock poisoned");
        slot.as_ref().map(|s| s.address.ip())
    }

    /// Snapshot of the active session for logging/diagnostics.
    pub fn active(&self) -> Option<ClientSession> {
        self.inner.read().expect("session lock poisoned").clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.read().expect("session lock poisoned").is_some()
    }
}
