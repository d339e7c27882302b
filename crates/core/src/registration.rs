//! Server registration with the signaling channel.
//!
//! Independent of any client session: this machine tracks our own
//! handshake with the signaling server. Registration is only attempted
//! once the channel is connected, and session commands are only honored
//! once registered.
//!
//! ```text
//! Unknown -> Connecting -> Connected -> Registering -> Registered
//!                |                          |
//!          ConnectionError          RegistrationError
//!                |                          |
//!                +--------> Unknown <-------+
//! ```
//!
//! `Closed` is reachable from any state when the channel goes away.

/// Registration machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unknown,
    Connecting,
    ConnectionError,
    /// Channel open, ready to register.
    Connected,
    Registering,
    RegistrationError,
    /// Registered with the signaling server; session commands accepted.
    Registered,
    /// Channel closed somewhere.
    Closed,
}

/// Process-wide registration state, owned by the reactor.
#[derive(Debug)]
pub struct Registration {
    state: RegistrationState,
}

impl Registration {
    pub fn new() -> Self {
        Registration {
            state: RegistrationState::Unknown,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn is_registered(&self) -> bool {
        self.state == RegistrationState::Registered
    }

    fn transition(&mut self, state: RegistrationState) {
        tracing::debug!(old_state = ?self.state, new_state = ?state, "registration transition");
        self.state = state;
    }

    /// Channel connect attempt started.
    pub fn connecting(&mut self) {
        self.transition(RegistrationState::Connecting);
    }

    /// Channel is open; registration may be sent.
    pub fn connected(&mut self) {
        self.transition(RegistrationState::Connected);
    }

    /// `REGISTER MEDIA` sent, waiting for the ack.
    pub fn registering(&mut self) {
        self.transition(RegistrationState::Registering);
    }

    /// Inbound `REGISTERED` ack. Only valid while registering; anything
    /// else folds back to `Unknown`.
    pub fn registered(&mut self) -> Result<(), crate::error::StateError> {
        if self.state != RegistrationState::Registering {
            let state = self.state;
            self.transition(RegistrationState::Unknown);
            return Err(crate::error::StateError::Registration("REGISTERED", state));
        }
        self.transition(RegistrationState::Registered);
        Ok(())
    }

    /// Inbound `ERROR <text>` frame.
    ///
    /// A connect or registration in flight moves through its error state
    /// and folds back to `Unknown` (a server in error must not continue);
    /// any other state is left alone. Returns the error state passed
    /// through, if any.
    pub fn channel_error(&mut self) -> Option<RegistrationState> {
        let via = match self.state {
            RegistrationState::Connecting => RegistrationState::ConnectionError,
            RegistrationState::Registering => RegistrationState::RegistrationError,
            _ => return None,
        };
        self.transition(via);
        self.transition(RegistrationState::Unknown);
        Some(via)
    }

    /// The signaling channel closed.
    pub fn closed(&mut self) {
        self.transition(RegistrationState::Closed);
    }
}

impl Default for Registration {
    fn default() -> Self {
        Self::new()
    }
}
