//! Media engine boundary.
//!
//! The engine is the external collaborator that owns the shared source,
//! builds per-client endpoints, and performs the actual ICE/DTLS/SRTP
//! work. The core only ever sees opaque handles and a small call surface:
//!
//! - synchronous calls on [`MediaEngine`], each returning success/failure;
//! - asynchronous completions and discoveries raised as [`EngineEvent`]s,
//!   which the engine must deliver into the reactor queue rather than
//!   calling into core state from its own threads.
//!
//! ## Attach/detach ordering
//!
//! The engine contract expects the caller (the [`Mountpoint`]) to hold a
//! strict order: `attach_endpoint` → `set_endpoint_live` →
//! `link_endpoint` on the way up, and `unlink_endpoint` →
//! `detach_endpoint` on the way down. Linking before the endpoint is live
//! can stall the shared source; detaching before unlinking leaves the
//! fan-out referencing a dead branch.
//!
//! [`Mountpoint`]: crate::mount::Mountpoint

pub mod sim;

use crate::error::EngineError;

/// Opaque handle to an engine-side per-client endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(pub u64);

/// Opaque handle to one branch of the source's output fan-out.
///
/// Branches are not independently addressable once removed, which is why
/// the mountpoint keeps them in the same record as their endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkId(pub u64);

/// Opaque handle to an auxiliary data channel on an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelId(pub u64);

/// Calls the core makes into the media engine.
///
/// Every method is non-blocking. [`create_offer`](Self::create_offer) is
/// intrinsically asynchronous: it returns once the request is issued and
/// the finished offer arrives later as [`EngineEvent::OfferCreated`].
pub trait MediaEngine: Send {
    /// Create a new endpoint for the shared source. Not yet linked.
    fn attach_endpoint(&mut self) -> Result<EndpointId, EngineError>;

    /// Set the endpoint live (delivering) or ready-but-idle, mirroring
    /// the source's own state.
    fn set_endpoint_live(&mut self, endpoint: EndpointId, live: bool) -> Result<(), EngineError>;

    /// Link the endpoint into the source's output fan-out.
    fn link_endpoint(&mut self, endpoint: EndpointId) -> Result<LinkId, EngineError>;

    /// Remove the endpoint's branch from the fan-out.
    fn unlink_endpoint(&mut self, link: LinkId) -> Result<(), EngineError>;

    /// Tear the endpoint down and release its resources.
    fn detach_endpoint(&mut self, endpoint: EndpointId) -> Result<(), EngineError>;

    /// Whether the shared source is currently producing output.
    fn query_playing(&self) -> bool;

    /// Ask the engine to build an SDP offer for this endpoint. The offer
    /// arrives later as [`EngineEvent::OfferCreated`].
    fn create_offer(&mut self, endpoint: EndpointId) -> Result<(), EngineError>;

    fn set_local_description(&mut self, endpoint: EndpointId, sdp: &str)
    -> Result<(), EngineError>;

    fn set_remote_description(
        &mut self,
        endpoint: EndpointId,
        sdp: &str,
    ) -> Result<(), EngineError>;

    fn add_ice_candidate(
        &mut self,
        endpoint: EndpointId,
        line_index: u32,
        candidate: &str,
    ) -> Result<(), EngineError>;

    /// Open an outbound data channel on the endpoint. Best effort: the
    /// caller logs and continues when the engine cannot provide one.
    fn create_data_channel(&mut self, endpoint: EndpointId) -> Result<ChannelId, EngineError>;
}

/// Delegation through a shared handle, so the reactor can drive the same
/// engine instance the embedding application holds a reference to.
impl<E: MediaEngine + ?Sized> MediaEngine for std::sync::Arc<parking_lot::Mutex<E>> {
    fn attach_endpoint(&mut self) -> Result<EndpointId, EngineError> {
        self.lock().attach_endpoint()
    }

    fn set_endpoint_live(&mut self, endpoint: EndpointId, live: bool) -> Result<(), EngineError> {
        self.lock().set_endpoint_live(endpoint, live)
    }

    fn link_endpoint(&mut self, endpoint: EndpointId) -> Result<LinkId, EngineError> {
        self.lock().link_endpoint(endpoint)
    }

    fn unlink_endpoint(&mut self, link: LinkId) -> Result<(), EngineError> {
        self.lock().unlink_endpoint(link)
    }

    fn detach_endpoint(&mut self, endpoint: EndpointId) -> Result<(), EngineError> {
        self.lock().detach_endpoint(endpoint)
    }

    fn query_playing(&self) -> bool {
        self.lock().query_playing()
    }

    fn create_offer(&mut self, endpoint: EndpointId) -> Result<(), EngineError> {
        self.lock().create_offer(endpoint)
    }

    fn set_local_description(
        &mut self,
        endpoint: EndpointId,
        sdp: &str,
    ) -> Result<(), EngineError> {
        self.lock().set_local_description(endpoint, sdp)
    }

    fn set_remote_description(
        &mut self,
        endpoint: EndpointId,
        sdp: &str,
    ) -> Result<(), EngineError> {
        self.lock().set_remote_description(endpoint, sdp)
    }

    fn add_ice_candidate(
        &mut self,
        endpoint: EndpointId,
        line_index: u32,
        candidate: &str,
    ) -> Result<(), EngineError> {
        self.lock().add_ice_candidate(endpoint, line_index, candidate)
    }

    fn create_data_channel(&mut self, endpoint: EndpointId) -> Result<ChannelId, EngineError> {
        self.lock().create_data_channel(endpoint)
    }
}

/// Asynchronous events originating inside the engine.
///
/// These are raised on engine-private threads and must re-enter the core
/// through the reactor queue (`ReactorEvent::Engine`), never by mutating
/// session or mountpoint state directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The endpoint wants an offer/answer exchange to (re)start.
    NegotiationNeeded { endpoint: EndpointId },

    /// Completion of [`MediaEngine::create_offer`].
    OfferCreated { endpoint: EndpointId, sdp: String },

    /// A local ICE candidate was discovered for the endpoint.
    IceCandidate {
        endpoint: EndpointId,
        line_index: u32,
        candidate: String,
    },

    /// The peer opened a data channel towards us.
    DataChannelOpened {
        endpoint: EndpointId,
        channel: ChannelId,
    },
}
