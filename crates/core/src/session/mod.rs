//! Client session management.
//!
//! A session is the server-side record of one signaling-connected browser
//! client. It is created when the signaling server binds the client to us
//! and destroyed when the client unbinds or the channel closes. It tracks:
//!
//! - The client's unique id (`client_uid`), stable for the session's life.
//! - The negotiation state machine driving the offer/answer/ICE exchange.
//! - The engine endpoint handle, present only while the client has an
//!   entry in the [`Mountpoint`](crate::mount::Mountpoint).
//! - Auxiliary data channel handles, present only once the engine reports
//!   them.
//!
//! ## Session lifecycle
//!
//! ```text
//! BIND-SESSION-CLIENT    -> Connecting -> Connected
//! connect-to-mountpoint  -> Mounted
//! negotiation-needed     -> Negotiating   (offer sent to peer)
//! SDP answer             -> Started
//! disconnect-mountpoint  -> Stopping -> Connected   (detached, still bound)
//! UNBIND-SESSION-CLIENT  -> Stopped       (removed)
//! channel close          -> Stopped       (removed, via cleanup)
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::engine::{ChannelId, EndpointId};
use crate::error::SessionError;

/// Default cap on concurrent sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// Per-session negotiation state machine.
///
/// Ordered: a session is "attached" from [`Mounted`](Self::Mounted)
/// onwards and "in negotiation" from [`Negotiating`](Self::Negotiating)
/// onwards. [`Stopped`](Self::Stopped) and [`Error`](Self::Error) are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Bind announced, handshake not yet complete.
    Connecting,
    /// Bound to the signaling channel, no media endpoint yet.
    Connected,
    /// Endpoint attached to the shared source, negotiation not started.
    Mounted,
    /// Offer sent (or being created); waiting for the peer's answer.
    Negotiating,
    /// Remote description applied; media flowing.
    Started,
    /// Disconnect in progress, endpoint being torn down.
    Stopping,
    /// Fully torn down (unbind or channel close).
    Stopped,
    /// An engine call failed mid-transition.
    Error,
}

impl SessionState {
    /// Whether a mountpoint entry may exist for a session in this state.
    pub fn is_attached(self) -> bool {
        matches!(
            self,
            Self::Mounted | Self::Negotiating | Self::Started | Self::Stopping
        )
    }

    /// Whether ICE candidates may be exchanged in this state.
    pub fn is_negotiating_or_later(self) -> bool {
        matches!(self, Self::Negotiating | Self::Started | Self::Stopping)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

/// Handles to the auxiliary data channels on a session's endpoint.
///
/// `outbound` is the channel we open at attach; `inbound` is recorded when
/// the engine reports the peer opened one towards us.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataChannels {
    pub outbound: Option<ChannelId>,
    pub inbound: Option<ChannelId>,
}

/// One known client.
///
/// Interior mutability via `RwLock`/atomics allows shared `Arc` references
/// between the reactor and inspection APIs.
#[derive(Debug)]
pub struct Session {
    /// Unique peer identifier, assigned by the signaling server.
    pub client_uid: u32,
    /// Current negotiation state.
    state: RwLock<SessionState>,
    /// Cleared on unbind; late engine completions check this and bail.
    active: AtomicBool,
    /// When the session was bound.
    pub joined_at: Instant,
    /// Engine endpoint handle, set only while a mountpoint entry exists.
    endpoint: RwLock<Option<EndpointId>>,
    /// Data channel handles, set only after the engine reports them.
    channels: RwLock<DataChannels>,
}

impl Session {
    fn new(client_uid: u32) -> Self {
        Session {
            client_uid,
            state: RwLock::new(SessionState::Connecting),
            active: AtomicBool::new(true),
            joined_at: Instant::now(),
            endpoint: RwLock::new(None),
            channels: RwLock::new(DataChannels::default()),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: SessionState) {
        tracing::debug!(
            client_uid = self.client_uid,
            old_state = ?*self.state.read(),
            new_state = ?state,
            "session state transition"
        );
        *self.state.write() = state;
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self) -> Option<EndpointId> {
        *self.endpoint.read()
    }

    pub fn set_endpoint(&self, endpoint: Option<EndpointId>) {
        *self.endpoint.write() = endpoint;
    }

    pub fn channels(&self) -> DataChannels {
        *self.channels.read()
    }

    pub fn set_outbound_channel(&self, channel: Option<ChannelId>) {
        self.channels.write().outbound = channel;
    }

    pub fn set_inbound_channel(&self, channel: Option<ChannelId>) {
        self.channels.write().inbound = channel;
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.set_state(SessionState::Stopped);
    }
}

/// Thread-safe table of known clients, keyed by `client_uid`.
///
/// Bounded: [`bind`](Self::bind) fails once `max_sessions` clients are
/// active. Backed by `parking_lot::RwLock`; the reactor is the only
/// writer.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<u32, Arc<Session>>>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        SessionRegistry {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
        }
    }

    /// Create and register a session for `client_uid`.
    ///
    /// Fails with [`SessionError::Duplicate`] if the client already has an
    /// active session, or [`SessionError::CapacityExceeded`] when the
    /// table is full.
    pub fn bind(&self, client_uid: u32) -> Result<Arc<Session>, SessionError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&client_uid) {
            return Err(SessionError::Duplicate(client_uid));
        }
        if sessions.len() >= self.max_sessions {
            return Err(SessionError::CapacityExceeded(self.max_sessions));
        }

        let session = Arc::new(Session::new(client_uid));
        sessions.insert(client_uid, session.clone());
        tracing::debug!(client_uid, total_sessions = sessions.len(), "session bound");
        Ok(session)
    }

    /// Look up an active session by client uid.
    pub fn lookup(&self, client_uid: u32) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .read()
            .get(&client_uid)
            .cloned()
            .ok_or(SessionError::NotFound(client_uid))
    }

    /// Resolve an engine event to its owning session.
    pub fn lookup_by_endpoint(&self, endpoint: EndpointId) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .values()
            .find(|s| s.endpoint() == Some(endpoint))
            .cloned()
    }

    /// Remove and deactivate a session.
    ///
    /// The caller must detach any mountpoint entry first; the registry
    /// does not reach into the mountpoint.
    pub fn unbind(&self, client_uid: u32) -> Result<Arc<Session>, SessionError> {
        let removed = self.sessions.write().remove(&client_uid);
        match removed {
            Some(session) => {
                session.deactivate();
                let total = self.sessions.read().len();
                tracing::debug!(client_uid, total_sessions = total, "session unbound");
                Ok(session)
            }
            None => Err(SessionError::NotFound(client_uid)),
        }
    }

    /// Snapshot of all active sessions (channel-close cleanup).
    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_creates_connecting_session() {
        let registry = SessionRegistry::default();
        let session = registry.bind(7).unwrap();
        assert_eq!(session.client_uid, 7);
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.is_active());
        assert_eq!(session.endpoint(), None);
    }

    #[test]
    fn bind_twice_is_duplicate() {
        let registry = SessionRegistry::default();
        registry.bind(7).unwrap();
        assert!(matches!(registry.bind(7), Err(SessionError::Duplicate(7))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unbind_unknown_is_not_found() {
        let registry = SessionRegistry::default();
        assert!(matches!(registry.unbind(9), Err(SessionError::NotFound(9))));
    }

    #[test]
    fn unbind_deactivates() {
        let registry = SessionRegistry::default();
        let session = registry.bind(3).unwrap();
        registry.unbind(3).unwrap();
        assert!(!session.is_active());
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(registry.lookup(3).is_err());
    }

    #[test]
    fn capacity_bound_and_slot_reuse() {
        let registry = SessionRegistry::new(2);
        registry.bind(1).unwrap();
        registry.bind(2).unwrap();
        assert!(matches!(
            registry.bind(3),
            Err(SessionError::CapacityExceeded(2))
        ));

        registry.unbind(1).unwrap();
        registry.bind(3).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn lookup_by_endpoint() {
        let registry = SessionRegistry::default();
        let session = registry.bind(4).unwrap();
        assert!(registry.lookup_by_endpoint(EndpointId(11)).is_none());
        session.set_endpoint(Some(EndpointId(11)));
        let found = registry.lookup_by_endpoint(EndpointId(11)).unwrap();
        assert_eq!(found.client_uid, 4);
    }

    #[test]
    fn attached_state_predicates() {
        assert!(!SessionState::Connected.is_attached());
        assert!(SessionState::Mounted.is_attached());
        assert!(SessionState::Stopping.is_attached());
        assert!(!SessionState::Stopped.is_attached());

        assert!(!SessionState::Mounted.is_negotiating_or_later());
        assert!(SessionState::Negotiating.is_negotiating_or_later());
        assert!(SessionState::Started.is_negotiating_or_later());
    }
}
