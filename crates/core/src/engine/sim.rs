//! In-process simulated media engine.
//!
//! Stands in for the real engine binding in demos and tests. It keeps a
//! table of endpoints, emits the engine-originated events a real engine
//! would (negotiation-needed on link, offer completion, a scripted ICE
//! candidate, a data channel after the answer), and records every call so
//! tests can assert ordering. It performs no media work at all.

use std::collections::HashMap;
use std::sync::mpsc;

use crate::engine::{ChannelId, EndpointId, EngineEvent, LinkId, MediaEngine};
use crate::error::EngineError;

const SIM_OFFER_SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=sim\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\n";
const SIM_ICE_CANDIDATE: &str = "candidate:1 1 UDP 2013266431 127.0.0.1 9 typ host";

#[derive(Debug)]
struct SimEndpoint {
    live: bool,
    link: Option<LinkId>,
}

/// Scripted stand-in for the media engine.
///
/// Constructed with the source's playing state; events are delivered on
/// the returned receiver, which the server drains into the reactor.
pub struct SimEngine {
    playing: bool,
    next_id: u64,
    endpoints: HashMap<u64, SimEndpoint>,
    events: mpsc::Sender<EngineEvent>,
    calls: Vec<String>,
    fail_next_link: bool,
    fail_next_detach: bool,
    fail_remote_description: bool,
}

impl SimEngine {
    pub fn new(playing: bool) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel();
        (
            SimEngine {
                playing,
                next_id: 1,
                endpoints: HashMap::new(),
                events: tx,
                calls: Vec::new(),
                fail_next_link: false,
                fail_next_detach: false,
                fail_remote_description: false,
            },
            rx,
        )
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Endpoints created and not yet torn down.
    pub fn live_endpoints(&self) -> usize {
        self.endpoints.len()
    }

    pub fn endpoint_is_live(&self, endpoint: EndpointId) -> bool {
        self.endpoints.get(&endpoint.0).is_some_and(|e| e.live)
    }

    /// Invocation log, one entry per engine call, in call order.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Make the next `link_endpoint` call fail (aborted-attach tests).
    pub fn fail_next_link(&mut self) {
        self.fail_next_link = true;
    }

    /// Make the next `detach_endpoint` call fail (failed-teardown tests).
    pub fn fail_next_detach(&mut self) {
        self.fail_next_detach = true;
    }

    /// Make `set_remote_description` fail (engine-error transition tests).
    pub fn fail_remote_description(&mut self) {
        self.fail_remote_description = true;
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn endpoint_mut(&mut self, endpoint: EndpointId) -> Result<&mut SimEndpoint, EngineError> {
        self.endpoints
            .get_mut(&endpoint.0)
            .ok_or_else(|| EngineError::new(format!("no endpoint {}", endpoint.0)))
    }

    fn emit(&self, event: EngineEvent) {
        // Receiver may be gone in unit tests that only drive calls.
        let _ = self.events.send(event);
    }
}

impl MediaEngine for SimEngine {
    fn attach_endpoint(&mut self) -> Result<EndpointId, EngineError> {
        let id = self.fresh_id();
        self.endpoints.insert(
            id,
            SimEndpoint {
                live: false,
                link: None,
            },
        );
        self.calls.push(format!("attach_endpoint -> {id}"));
        Ok(EndpointId(id))
    }

    fn set_endpoint_live(&mut self, endpoint: EndpointId, live: bool) -> Result<(), EngineError> {
        self.endpoint_mut(endpoint)?.live = live;
        self.calls.push(format!("set_endpoint_live {} {live}", endpoint.0));
        Ok(())
    }

    fn link_endpoint(&mut self, endpoint: EndpointId) -> Result<LinkId, EngineError> {
        if self.fail_next_link {
            self.fail_next_link = false;
            self.calls.push(format!("link_endpoint {} -> fail", endpoint.0));
            return Err(EngineError::new("unable to link endpoint to fan-out"));
        }
        let link = LinkId(self.fresh_id());
        self.endpoint_mut(endpoint)?.link = Some(link);
        self.calls
            .push(format!("link_endpoint {} -> {}", endpoint.0, link.0));
        self.emit(EngineEvent::NegotiationNeeded { endpoint });
        Ok(link)
    }

    fn unlink_endpoint(&mut self, link: LinkId) -> Result<(), EngineError> {
        let entry = self
            .endpoints
            .values_mut()
            .find(|e| e.link == Some(link))
            .ok_or_else(|| EngineError::new(format!("no fan-out branch {}", link.0)))?;
        entry.link = None;
        self.calls.push(format!("unlink_endpoint {}", link.0));
        Ok(())
    }

    fn detach_endpoint(&mut self, endpoint: EndpointId) -> Result<(), EngineError> {
        if self.fail_next_detach {
            self.fail_next_detach = false;
            self.calls
                .push(format!("detach_endpoint {} -> fail", endpoint.0));
            return Err(EngineError::new("unable to tear endpoint down"));
        }
        self.endpoints
            .remove(&endpoint.0)
            .ok_or_else(|| EngineError::new(format!("no endpoint {}", endpoint.0)))?;
        self.calls.push(format!("detach_endpoint {}", endpoint.0));
        Ok(())
    }

    fn query_playing(&self) -> bool {
        self.playing
    }

    fn create_offer(&mut self, endpoint: EndpointId) -> Result<(), EngineError> {
        self.endpoint_mut(endpoint)?;
        self.calls.push(format!("create_offer {}", endpoint.0));
        self.emit(EngineEvent::OfferCreated {
            endpoint,
            sdp: SIM_OFFER_SDP.to_string(),
        });
        Ok(())
    }

    fn set_local_description(
        &mut self,
        endpoint: EndpointId,
        _sdp: &str,
    ) -> Result<(), EngineError> {
        self.endpoint_mut(endpoint)?;
        self.calls.push(format!("set_local_description {}", endpoint.0));
        self.emit(EngineEvent::IceCandidate {
            endpoint,
            line_index: 0,
            candidate: SIM_ICE_CANDIDATE.to_string(),
        });
        Ok(())
    }

    fn set_remote_description(
        &mut self,
        endpoint: EndpointId,
        _sdp: &str,
    ) -> Result<(), EngineError> {
        if self.fail_remote_description {
            self.fail_remote_description = false;
            self.calls
                .push(format!("set_remote_description {} -> fail", endpoint.0));
            return Err(EngineError::new("unable to apply remote description"));
        }
        self.endpoint_mut(endpoint)?;
        self.calls.push(format!("set_remote_description {}", endpoint.0));
        let channel = ChannelId(self.fresh_id());
        self.emit(EngineEvent::DataChannelOpened { endpoint, channel });
        Ok(())
    }

    fn add_ice_candidate(
        &mut self,
        endpoint: EndpointId,
        line_index: u32,
        _candidate: &str,
    ) -> Result<(), EngineError> {
        self.endpoint_mut(endpoint)?;
        self.calls
            .push(format!("add_ice_candidate {} {line_index}", endpoint.0));
        Ok(())
    }

    fn create_data_channel(&mut self, endpoint: EndpointId) -> Result<ChannelId, EngineError> {
        self.endpoint_mut(endpoint)?;
        let channel = ChannelId(self.fresh_id());
        self.calls
            .push(format!("create_data_channel {} -> {}", endpoint.0, channel.0));
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_emits_negotiation_needed() {
        let (mut engine, events) = SimEngine::new(true);
        let endpoint = engine.attach_endpoint().unwrap();
        engine.link_endpoint(endpoint).unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::NegotiationNeeded { endpoint }
        );
    }

    #[test]
    fn offer_completion_is_asynchronous_event() {
        let (mut engine, events) = SimEngine::new(true);
        let endpoint = engine.attach_endpoint().unwrap();
        engine.create_offer(endpoint).unwrap();
        match events.try_recv().unwrap() {
            EngineEvent::OfferCreated { endpoint: ep, sdp } => {
                assert_eq!(ep, endpoint);
                assert!(sdp.starts_with("v=0"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn calls_are_recorded_in_order() {
        let (mut engine, _events) = SimEngine::new(true);
        let endpoint = engine.attach_endpoint().unwrap();
        engine.set_endpoint_live(endpoint, true).unwrap();
        let link = engine.link_endpoint(endpoint).unwrap();
        engine.unlink_endpoint(link).unwrap();
        engine.detach_endpoint(endpoint).unwrap();

        let calls: Vec<&str> = engine
            .calls()
            .iter()
            .map(|c| c.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(
            calls,
            vec![
                "attach_endpoint",
                "set_endpoint_live",
                "link_endpoint",
                "unlink_endpoint",
                "detach_endpoint"
            ]
        );
    }

    #[test]
    fn unknown_endpoint_is_engine_error() {
        let (mut engine, _events) = SimEngine::new(true);
        assert!(engine.create_offer(EndpointId(99)).is_err());
        assert!(engine.detach_endpoint(EndpointId(99)).is_err());
    }
}
