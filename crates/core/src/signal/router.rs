use std::sync::Arc;

use crate::engine::{EngineEvent, MediaEngine};
use crate::error::{ChannelError, ProtocolError, Result, ServerError, SessionError, StateError};
use crate::mount::Mountpoint;
use crate::registration::Registration;
use crate::session::{Session, SessionRegistry, SessionState};
use crate::signal::control::{self, ControlMessage};
use crate::signal::envelope::{self, CommandKind, Envelope, EnvelopeBody};

/// Outbound half of the signaling channel.
///
/// The transport provides the real implementation; tests substitute an
/// in-memory recorder.
pub trait SignalSink: Send {
    fn send_text(&mut self, frame: &str) -> std::result::Result<(), ChannelError>;
}

/// Dispatches signaling frames and engine events onto the session
/// registry, the mountpoint, and the two state machines.
///
/// Owned by the reactor: every method here runs on the single reactor
/// timeline, so per-session transitions are strictly sequential.
pub struct Router {
    registry: SessionRegistry,
    mount: Mountpoint,
    registration: Registration,
    engine: Box<dyn MediaEngine>,
    sink: Box<dyn SignalSink>,
}

impl Router {
    pub fn new(
        registry: SessionRegistry,
        mount: Mountpoint,
        engine: Box<dyn MediaEngine>,
        sink: Box<dyn SignalSink>,
    ) -> Self {
        Router {
            registry,
            mount,
            registration: Registration::new(),
            engine,
            sink,
        }
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Channel connect attempt started.
    pub fn channel_connecting(&mut self) {
        self.registration.connecting();
    }

    /// Channel is open: announce ourselves as the media source.
    pub fn channel_connected(&mut self) -> Result<()> {
        self.registration.connected();
        tracing::info!("registering with signaling server");
        self.registration.registering();
        self.send(control::REGISTER_MEDIA)
    }

    /// The signaling channel closed: terminal for every session.
    ///
    /// All endpoints are detached (best effort) and all sessions removed.
    /// The process itself survives and may reconnect.
    pub fn channel_closed(&mut self) {
        self.registration.closed();
        let sessions = self.registry.all();
        tracing::info!(sessions = sessions.len(), "signaling channel closed");
        for session in sessions {
            if self.mount.find(session.client_uid).is_some()
                && let Err(e) = self.mount.detach(session.client_uid, self.engine.as_mut())
            {
                tracing::warn!(client_uid = session.client_uid, error = %e, "detach on channel close failed");
            }
            session.set_endpoint(None);
            let _ = self.registry.unbind(session.client_uid);
        }
    }

    /// Process one inbound text frame.
    ///
    /// Control commands are tried first; anything else is treated as a
    /// JSON envelope. The returned error mirrors what was logged (and,
    /// for mountpoint commands, reported back to the peer).
    pub fn handle_frame(&mut self, frame: &str) -> Result<()> {
        match ControlMessage::parse(frame) {
            Some(message) => self.handle_control(message),
            None => self.handle_envelope(frame),
        }
    }

    fn handle_control(&mut self, message: ControlMessage) -> Result<()> {
        match message {
            ControlMessage::Registered => {
                self.registration.registered().map_err(|e| {
                    tracing::error!(error = %e, "unexpected REGISTERED ack");
                    e
                })?;
                tracing::info!("registered with signaling server");
                Ok(())
            }
            ControlMessage::Bind(client_uid) => self.handle_bind(client_uid),
            ControlMessage::Unbind(client_uid) => self.handle_unbind(client_uid),
            ControlMessage::Error(text) => {
                let via = self.registration.channel_error();
                tracing::error!(text, passed_through = ?via, "signaling server reported error");
                Ok(())
            }
        }
    }

    fn handle_bind(&mut self, client_uid: u32) -> Result<()> {
        self.require_registered("BIND-SESSION-CLIENT")?;

        let session = self.registry.bind(client_uid).map_err(|e| {
            tracing::error!(client_uid, error = %e, "bind failed");
            e
        })?;

        // Bind handshake completes immediately on our side.
        session.set_state(SessionState::Connected);
        tracing::info!(client_uid, "client session bound");
        self.send(&control::session_bound(client_uid))
    }

    fn handle_unbind(&mut self, client_uid: u32) -> Result<()> {
        self.require_registered("UNBIND-SESSION-CLIENT")?;

        let session = self.registry.lookup(client_uid).map_err(|e| {
            tracing::error!(client_uid, error = %e, "unbind failed");
            e
        })?;

        // Mountpoint entry goes first; the session record follows.
        if self.mount.find(client_uid).is_some() {
            if let Err(e) = self.mount.detach(client_uid, self.engine.as_mut()) {
                tracing::warn!(client_uid, error = %e, "problem detaching client on unbind");
            }
            session.set_endpoint(None);
        }
        let _ = self.registry.unbind(client_uid);

        tracing::info!(client_uid, "client session unbound");
        self.send(&control::session_unbound(client_uid))
    }

    fn require_registered(&self, command: &str) -> Result<()> {
        if self.registration.is_registered() {
            Ok(())
        } else {
            let state = self.registration.state();
            tracing::warn!(command, registration_state = ?state, "command before registration, ignoring");
            Err(StateError::Registration("session command", state).into())
        }
    }

    fn handle_envelope(&mut self, frame: &str) -> Result<()> {
        let envelope = Envelope::parse(frame).map_err(|e| {
            match e {
                ProtocolError::Malformed(_) => {
                    tracing::warn!(frame, "unknown message, ignoring");
                }
                ref e => tracing::error!(error = %e, "bad envelope"),
            }
            e
        })?;

        let session = self.registry.lookup(envelope.client_uid).map_err(|e| {
            tracing::error!(
                client_uid = envelope.client_uid,
                "trying to access non-existent client session"
            );
            e
        })?;

        match envelope.body.clone() {
            EnvelopeBody::Command(kind) => self.handle_command(&envelope, &session, kind),
            EnvelopeBody::Answer { sdp } => self.handle_answer(&session, &sdp),
            EnvelopeBody::Ice {
                line_index,
                candidate,
            } => self.handle_peer_ice(&session, line_index, &candidate),
            EnvelopeBody::Unknown => {
                tracing::warn!(frame, "ignoring unknown JSON message");
                Ok(())
            }
        }
    }

    /// Mountpoint commands reply to the peer either way: the inbound
    /// envelope is echoed with `success` (and an error message on
    /// failure).
    fn handle_command(
        &mut self,
        envelope: &Envelope,
        session: &Arc<Session>,
        kind: CommandKind,
    ) -> Result<()> {
        let outcome = match kind {
            CommandKind::ConnectToMountpoint => self.connect_to_mountpoint(session),
            CommandKind::DisconnectMountpoint => self.disconnect_mountpoint(session),
        };

        match outcome {
            Ok(()) => self.send(&envelope.success_reply()),
            Err(e) => {
                tracing::error!(client_uid = session.client_uid, error = %e, "command failed");
                let reply = envelope.failure_reply(&e.to_string());
                self.send(&reply)?;
                Err(e)
            }
        }
    }

    fn connect_to_mountpoint(&mut self, session: &Arc<Session>) -> Result<()> {
        let state = session.state();
        if !matches!(state, SessionState::Connecting | SessionState::Connected) {
            return Err(StateError::AlreadyConnected(session.client_uid).into());
        }

        let endpoint = self
            .mount
            .attach(session, self.engine.as_mut())
            .map_err(|e| {
                if matches!(e, ServerError::Engine(_)) {
                    session.set_state(SessionState::Error);
                }
                e
            })?;
        session.set_endpoint(Some(endpoint));
        session.set_state(SessionState::Mounted);

        // Outbound data channel is best effort; the stream works without it.
        match self.engine.create_data_channel(endpoint) {
            Ok(channel) => session.set_outbound_channel(Some(channel)),
            Err(e) => {
                tracing::warn!(client_uid = session.client_uid, error = %e, "could not create data channel");
            }
        }

        tracing::info!(
            client_uid = session.client_uid,
            attached = self.mount.len(),
            "client connected to mountpoint"
        );
        Ok(())
    }

    fn disconnect_mountpoint(&mut self, session: &Arc<Session>) -> Result<()> {
        if !session.state().is_attached() {
            return Err(StateError::NotConnected(session.client_uid).into());
        }

        session.set_state(SessionState::Stopping);
        self.mount
            .detach(session.client_uid, self.engine.as_mut())
            .map_err(|e| {
                if matches!(e, ServerError::Engine(_)) {
                    session.set_state(SessionState::Error);
                }
                e
            })?;
        session.set_endpoint(None);
        session.set_outbound_channel(None);
        session.set_inbound_channel(None);

        // Detached but still bound: the session drops back to Connected.
        session.set_state(SessionState::Connected);
        tracing::info!(
            client_uid = session.client_uid,
            attached = self.mount.len(),
            "client disconnected from mountpoint"
        );
        Ok(())
    }

    fn handle_answer(&mut self, session: &Arc<Session>, sdp: &str) -> Result<()> {
        let state = session.state();
        if state != SessionState::Negotiating {
            let e = StateError::UnexpectedAnswer(session.client_uid, state);
            tracing::error!(client_uid = session.client_uid, error = %e, "rejecting answer");
            return Err(e.into());
        }

        let endpoint = self.session_endpoint(session)?;
        tracing::debug!(client_uid = session.client_uid, "applying SDP answer");
        if let Err(e) = self.engine.set_remote_description(endpoint, sdp) {
            session.set_state(SessionState::Error);
            return Err(e.into());
        }
        session.set_state(SessionState::Started);
        Ok(())
    }

    fn handle_peer_ice(
        &mut self,
        session: &Arc<Session>,
        line_index: u32,
        candidate: &str,
    ) -> Result<()> {
        let state = session.state();
        if !state.is_negotiating_or_later() {
            let e = StateError::PrematureIce(session.client_uid, state);
            tracing::error!(client_uid = session.client_uid, error = %e, "rejecting ICE candidate");
            return Err(e.into());
        }

        let endpoint = self.session_endpoint(session)?;
        if let Err(e) = self.engine.add_ice_candidate(endpoint, line_index, candidate) {
            session.set_state(SessionState::Error);
            return Err(e.into());
        }
        Ok(())
    }

    fn session_endpoint(&self, session: &Session) -> Result<crate::engine::EndpointId> {
        session
            .endpoint()
            .or_else(|| self.mount.find(session.client_uid))
            .ok_or_else(|| {
                tracing::error!(
                    client_uid = session.client_uid,
                    "no endpoint found for session"
                );
                SessionError::NotFound(session.client_uid).into()
            })
    }

    /// Process one engine-originated event.
    ///
    /// Events for endpoints that no longer resolve to an active session
    /// are late completions of cancelled work and are discarded.
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Result<()> {
        match event {
            EngineEvent::NegotiationNeeded { endpoint } => {
                let session = match self.resolve_endpoint(endpoint, "negotiation-needed") {
                    Some(s) => s,
                    None => return Ok(()),
                };
                session.set_state(SessionState::Negotiating);
                if let Err(e) = self.engine.create_offer(endpoint) {
                    session.set_state(SessionState::Error);
                    return Err(e.into());
                }
                Ok(())
            }
            EngineEvent::OfferCreated { endpoint, sdp } => {
                let session = match self.resolve_endpoint(endpoint, "offer-created") {
                    Some(s) => s,
                    None => return Ok(()),
                };
                if session.state() != SessionState::Negotiating {
                    tracing::warn!(
                        client_uid = session.client_uid,
                        state = ?session.state(),
                        "dropping offer for session not in negotiation"
                    );
                    return Ok(());
                }
                if let Err(e) = self.engine.set_local_description(endpoint, &sdp) {
                    session.set_state(SessionState::Error);
                    return Err(e.into());
                }
                tracing::debug!(client_uid = session.client_uid, "sending SDP offer");
                self.send(&envelope::offer_message(session.client_uid, &sdp))
            }
            EngineEvent::IceCandidate {
                endpoint,
                line_index,
                candidate,
            } => {
                let session = match self.resolve_endpoint(endpoint, "ice-candidate") {
                    Some(s) => s,
                    None => return Ok(()),
                };
                if !session.state().is_negotiating_or_later() {
                    tracing::warn!(
                        client_uid = session.client_uid,
                        "can't send ICE, not in call"
                    );
                    return Ok(());
                }
                self.send(&envelope::ice_message(
                    session.client_uid,
                    line_index,
                    &candidate,
                ))
            }
            EngineEvent::DataChannelOpened { endpoint, channel } => {
                if let Some(session) = self.resolve_endpoint(endpoint, "data-channel") {
                    tracing::info!(client_uid = session.client_uid, "data channel opened");
                    session.set_inbound_channel(Some(channel));
                }
                Ok(())
            }
        }
    }

    fn resolve_endpoint(
        &self,
        endpoint: crate::engine::EndpointId,
        event: &str,
    ) -> Option<Arc<Session>> {
        let session = self.registry.lookup_by_endpoint(endpoint);
        match session {
            Some(s) if s.is_active() => Some(s),
            _ => {
                tracing::debug!(endpoint = endpoint.0, event, "discarding event for inactive session");
                None
            }
        }
    }

    fn send(&mut self, frame: &str) -> Result<()> {
        self.sink.send_text(frame).map_err(|e| {
            tracing::error!(error = %e, "failed to send signaling frame");
            ServerError::Channel(e)
        })
    }
}
