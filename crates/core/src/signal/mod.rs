//! Signaling message router.
//!
//! Two message layers share the one signaling channel:
//!
//! 1. **Control commands** ([`control`]): plain-text lines from the
//!    signaling server itself. Registration ack, bind/unbind, errors.
//! 2. **JSON envelopes** ([`envelope`]): messages forwarded verbatim
//!    from browser clients. Mountpoint commands, SDP answers, ICE.
//!
//! Inbound frames are tried as control commands first and fall through to
//! the JSON layer. The [`Router`]
//! resolves each message to its owning session before any state mutation,
//! and engine-originated events re-enter through the same resolution.

pub mod control;
pub mod envelope;
pub mod router;

pub use control::ControlMessage;
pub use envelope::{CommandKind, Envelope, EnvelopeBody};
pub use router::{Router, SignalSink};
