//! Integration test: full signaling handshake against a scripted
//! signaling server.
//!
//! The test plays the signaling-server side over a real TCP socket
//! (registration, bind, connect-to-mountpoint, offer/answer/ICE, unbind)
//! and watches the core's session and mountpoint state advance.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use serde_json::Value;

use webrtc_mount::engine::sim::SimEngine;
use webrtc_mount::{Server, ServerConfig, SessionState};

struct SignalPeer {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl SignalPeer {
    fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().expect("accept media server");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let writer = stream.try_clone().unwrap();
        SignalPeer {
            reader: BufReader::new(stream),
            writer,
        }
    }

    fn send(&mut self, frame: &str) {
        self.writer.write_all(frame.as_bytes()).unwrap();
        self.writer.write_all(b"\n").unwrap();
        self.writer.flush().unwrap();
    }

    fn recv(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read frame");
        line.trim_end().to_string()
    }
}

fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not reached within deadline");
}

#[test]
fn full_handshake_bind_connect_negotiate_unbind() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let (engine, events) = SimEngine::new(true);
    let mut server = Server::new(ServerConfig {
        signal_addr: addr.to_string(),
        max_sessions: 8,
    });
    server.connect(Box::new(engine), events).expect("connect");

    let mut peer = SignalPeer::accept(&listener);

    // Registration handshake.
    assert_eq!(peer.recv(), "REGISTER MEDIA");
    peer.send("REGISTERED");

    // Bind client 7.
    peer.send("BIND-SESSION-CLIENT 7");
    assert_eq!(peer.recv(), "SESSION 7 BOUND");
    assert_eq!(server.session_count(), 1);
    assert_eq!(
        server.registry().lookup(7).unwrap().state(),
        SessionState::Connected
    );

    // Connect to the mountpoint: success echo, then the offer.
    peer.send(r#"{"client_uid":7,"command":{"type":"connect-to-mountpoint"}}"#);
    let reply: Value = serde_json::from_str(&peer.recv()).unwrap();
    assert_eq!(reply["success"], true);
    assert_eq!(reply["command"]["type"], "connect-to-mountpoint");
    assert_eq!(server.attached_clients(), vec![7]);

    let offer: Value = serde_json::from_str(&peer.recv()).unwrap();
    assert_eq!(offer["client_uid"], 7);
    assert_eq!(offer["sdp"]["type"], "offer");
    assert!(offer["sdp"]["sdp"].as_str().unwrap().starts_with("v=0"));

    // The simulated engine discovers one local candidate after the offer.
    let ice: Value = serde_json::from_str(&peer.recv()).unwrap();
    assert_eq!(ice["client_uid"], 7);
    assert!(ice["ice"]["candidate"].as_str().unwrap().starts_with("candidate:"));

    // Answer completes negotiation.
    peer.send(r#"{"client_uid":7,"sdp":{"type":"answer","sdp":"v=0"}}"#);
    wait_until(|| server.registry().lookup(7).unwrap().state() == SessionState::Started);

    // Remote candidate is accepted once negotiating.
    peer.send(r#"{"client_uid":7,"ice":{"candidate":"candidate:2","sdpMLineIndex":0}}"#);

    // Unbind tears the endpoint down and removes the session.
    peer.send("UNBIND-SESSION-CLIENT 7");
    assert_eq!(peer.recv(), "SESSION 7 UNBOUND");
    assert!(server.attached_clients().is_empty());
    assert_eq!(server.session_count(), 0);

    server.shutdown();
}

#[test]
fn idle_source_rejects_connect_with_failure_echo() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let (engine, events) = SimEngine::new(false);
    let mut server = Server::new(ServerConfig {
        signal_addr: addr.to_string(),
        max_sessions: 8,
    });
    server.connect(Box::new(engine), events).expect("connect");

    let mut peer = SignalPeer::accept(&listener);
    assert_eq!(peer.recv(), "REGISTER MEDIA");
    peer.send("REGISTERED");
    peer.send("BIND-SESSION-CLIENT 3");
    assert_eq!(peer.recv(), "SESSION 3 BOUND");

    peer.send(r#"{"client_uid":3,"command":{"type":"connect-to-mountpoint"}}"#);
    let reply: Value = serde_json::from_str(&peer.recv()).unwrap();
    assert_eq!(reply["success"], false);
    assert!(reply["return-message"].as_str().unwrap().contains("not playing"));

    assert!(server.attached_clients().is_empty());
    assert_eq!(
        server.registry().lookup(3).unwrap().state(),
        SessionState::Connected
    );

    server.shutdown();
}

#[test]
fn channel_close_tears_down_all_sessions() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let (engine, events) = SimEngine::new(true);
    let mut server = Server::new(ServerConfig {
        signal_addr: addr.to_string(),
        max_sessions: 8,
    });
    server.connect(Box::new(engine), events).expect("connect");

    let mut peer = SignalPeer::accept(&listener);
    assert_eq!(peer.recv(), "REGISTER MEDIA");
    peer.send("REGISTERED");
    for uid in [1, 2] {
        peer.send(&format!("BIND-SESSION-CLIENT {uid}"));
        assert_eq!(peer.recv(), format!("SESSION {uid} BOUND"));
    }
    peer.send(r#"{"client_uid":1,"command":{"type":"connect-to-mountpoint"}}"#);
    let reply: Value = serde_json::from_str(&peer.recv()).unwrap();
    assert_eq!(reply["success"], true);

    // Signaling server goes away.
    drop(peer);
    wait_until(|| server.session_count() == 0);
    assert!(server.attached_clients().is_empty());

    server.shutdown();
}
