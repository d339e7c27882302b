use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::engine::{EngineEvent, MediaEngine};
use crate::error::{ChannelError, Result};
use crate::mount::Mountpoint;
use crate::reactor::{self, ReactorEvent};
use crate::session::{DEFAULT_MAX_SESSIONS, SessionRegistry};
use crate::signal::Router;
use crate::transport::TcpSink;
use crate::transport::tcp;

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the signaling server (`host:port`).
    pub signal_addr: String,
    /// Upper bound on concurrent client sessions.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            signal_addr: "127.0.0.1:8443".to_string(),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// High-level orchestrator for one shared camera source.
///
/// Owns the session registry and the mountpoint, dials the signaling
/// server, and runs the reactor that serializes frames and engine
/// events. The media engine is supplied by the caller along with the
/// receiver for its events.
pub struct Server {
    config: ServerConfig,
    registry: SessionRegistry,
    mount: Mountpoint,
    running: Arc<AtomicBool>,
    stream: Option<TcpStream>,
    reactor: Option<JoinHandle<&'static str>>,
    reader: Option<JoinHandle<()>>,
    bridge: Option<JoinHandle<()>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let registry = SessionRegistry::new(config.max_sessions);
        Server {
            config,
            registry,
            mount: Mountpoint::new(),
            running: Arc::new(AtomicBool::new(false)),
            stream: None,
            reactor: None,
            reader: None,
            bridge: None,
        }
    }

    /// Connect to the signaling server and start serving.
    ///
    /// Dials the configured address, sends `REGISTER MEDIA`, and spawns
    /// the reader and reactor threads. `engine_events` is the engine's
    /// event stream; it is bridged onto the reactor queue so engine
    /// threads never touch core state.
    pub fn connect(
        &mut self,
        engine: Box<dyn MediaEngine>,
        engine_events: mpsc::Receiver<EngineEvent>,
    ) -> Result<()> {
        tracing::info!(addr = %self.config.signal_addr, "connecting to signaling server");
        let stream = TcpStream::connect(&self.config.signal_addr).map_err(ChannelError::Io)?;
        let reader_stream = stream.try_clone().map_err(ChannelError::Io)?;
        let sink_stream = stream.try_clone().map_err(ChannelError::Io)?;

        let mut router = Router::new(
            self.registry.clone(),
            self.mount.clone(),
            engine,
            Box::new(TcpSink::new(sink_stream)),
        );
        router.channel_connecting();
        router.channel_connected()?;

        self.running.store(true, Ordering::SeqCst);
        self.stream = Some(stream);

        let (queue, events) = mpsc::channel();

        let reader_queue = queue.clone();
        let running = self.running.clone();
        self.reader = Some(thread::spawn(move || {
            tcp::read_loop(reader_stream, reader_queue, running);
        }));

        self.bridge = Some(thread::spawn(move || {
            for event in engine_events {
                if queue.send(ReactorEvent::Engine(event)).is_err() {
                    break;
                }
            }
        }));

        self.reactor = Some(thread::spawn(move || {
            let reason = reactor::run(router, events);
            tracing::info!(reason, "reactor exited");
            reason
        }));

        Ok(())
    }

    /// Stop serving: closes the socket and waits for the reactor to
    /// finish its channel-close cleanup.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.reactor.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.bridge.take() {
            let _ = handle.join();
        }
        tracing::info!("server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Client uids currently attached to the mountpoint, in order.
    pub fn attached_clients(&self) -> Vec<u32> {
        self.mount.attached_uids()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn mount(&self) -> &Mountpoint {
        &self.mount
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.is_running() {
            self.shutdown();
        }
    }
}
