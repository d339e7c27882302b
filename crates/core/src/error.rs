//! Error types for the mountpoint server core.

/// Top-level error for the server core.
///
/// Variants group by the subsystem that raised them:
///
/// - **Signaling**: [`Protocol`](Self::Protocol) — malformed frames.
/// - **Registry**: [`Session`](Self::Session) — bind/unbind failures.
/// - **Mountpoint**: [`Mount`](Self::Mount) — attach/detach failures.
/// - **Negotiation**: [`State`](Self::State) — transitions invalid for the
///   session's current state.
/// - **Media engine**: [`Engine`](Self::Engine) — an engine call failed.
/// - **Channel**: [`Channel`](Self::Channel) — the signaling channel is gone.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("mount error: {0}")]
    Mount(#[from] MountError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// A frame that could not be understood at the wire level.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame was not valid JSON and matched no control command.
    #[error("unparseable frame: {0}")]
    Malformed(String),

    /// JSON envelope missing the mandatory `client_uid` field.
    #[error("json message received without client_uid")]
    MissingClientUid,

    /// `command` body missing its `type` field.
    #[error("received command without 'type'")]
    MissingCommandType,

    /// `command.type` is not one of the known commands.
    #[error("unknown command type {0}")]
    UnknownCommand(String),

    /// `sdp` body missing its `type` field.
    #[error("received SDP without 'type'")]
    MissingSdpType,

    /// `sdp.type` was not `answer` (the core only ever receives answers).
    #[error("SDP message not of 'answer' type: {0}")]
    NotAnAnswer(String),
}

/// [`SessionRegistry`](crate::session::SessionRegistry) failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// An active session already exists for this client.
    #[error("client {0} already in session")]
    Duplicate(u32),

    /// No active session for this client.
    #[error("no client session {0}")]
    NotFound(u32),

    /// The registry is at its configured session bound.
    #[error("no space to register client session (capacity {0})")]
    CapacityExceeded(usize),
}

/// [`Mountpoint`](crate::mount::Mountpoint) failures.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    /// The client already has an endpoint attached to the source.
    #[error("client {0} already connected to mountpoint")]
    AlreadyAttached(u32),

    /// No endpoint attached for this client.
    #[error("client {0} not attached to mountpoint")]
    NotAttached(u32),

    /// The shared source is not currently producing output.
    #[error("mountpoint source is not playing")]
    SourceNotActive,
}

/// A message or event arrived in a session state that cannot accept it.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// connect-to-mountpoint for a session already past Connected.
    #[error("client {0} is already connected to a stream")]
    AlreadyConnected(u32),

    /// disconnect-mountpoint for a session not connected to a stream.
    #[error("client {0} is not currently connected to a stream")]
    NotConnected(u32),

    /// SDP answer received outside the Negotiating state.
    #[error("unexpected SDP answer for client {0} (state {1:?})")]
    UnexpectedAnswer(u32, crate::session::SessionState),

    /// Peer ICE candidate received before negotiation began.
    #[error("premature ICE candidate for client {0} (state {1:?})")]
    PrematureIce(u32, crate::session::SessionState),

    /// Control command that the registration machine cannot accept
    /// (e.g. REGISTERED while not registering).
    #[error("received {0} in registration state {1:?}")]
    Registration(&'static str, crate::registration::RegistrationState),
}

/// A media engine call failed or returned nothing.
///
/// The engine is an external collaborator; its failures carry only a
/// message. A session that hits one of these mid-transition moves to
/// [`SessionState::Error`](crate::session::SessionState::Error).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Signaling channel failures.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel is not open for sending.
    #[error("no signaling channel connection")]
    NotOpen,

    /// Underlying socket error.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, ServerError>`.
pub type Result<T> = std::result::Result<T, ServerError>;
