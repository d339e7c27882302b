//! Single-reactor event loop.
//!
//! Every inbound signaling frame and every engine-originated event is
//! serialized onto one queue and drained by one thread, so all mutation
//! of the registry, the mountpoint, and the state machines happens on a
//! single control-flow timeline. Per-session ordering follows for free:
//! no second event for a client is processed before the previous one's
//! mutation completed.

use std::sync::mpsc;

use crate::engine::EngineEvent;
use crate::signal::Router;

/// One item on the reactor timeline.
#[derive(Debug)]
pub enum ReactorEvent {
    /// An inbound signaling frame.
    Frame(String),
    /// An engine-originated event, marshaled off the engine's thread.
    Engine(EngineEvent),
    /// The signaling channel went away.
    ChannelClosed,
}

/// Drain the queue into the router until the channel closes or every
/// sender is gone. Returns the reason for exiting.
pub fn run(mut router: Router, events: mpsc::Receiver<ReactorEvent>) -> &'static str {
    for event in events {
        match event {
            ReactorEvent::Frame(frame) => {
                // Router logs and reports failures itself; a bad frame
                // never stops the loop.
                let _ = router.handle_frame(&frame);
            }
            ReactorEvent::Engine(event) => {
                let _ = router.handle_engine_event(event);
            }
            ReactorEvent::ChannelClosed => {
                router.channel_closed();
                return "channel closed";
            }
        }
    }
    "queue drained"
}
