use clap::Parser;
use std::io;

use webrtc_mount::engine::sim::SimEngine;
use webrtc_mount::{Server, ServerConfig};

#[derive(Parser)]
#[command(
    name = "webrtc-mount-server",
    about = "WebRTC mountpoint server for a shared camera source"
)]
struct Args {
    /// Signaling server address (host:port)
    #[arg(long, short, default_value = "127.0.0.1:8443")]
    signal: String,

    /// Maximum concurrent client sessions
    #[arg(long, default_value_t = 1000)]
    max_sessions: usize,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    // Simulated engine: the real media binding lives out of process.
    let (engine, events) = SimEngine::new(true);

    let mut server = Server::new(ServerConfig {
        signal_addr: args.signal.clone(),
        max_sessions: args.max_sessions,
    });

    if let Err(e) = server.connect(Box::new(engine), events) {
        eprintln!("Failed to connect to signaling server: {}", e);
        return;
    }

    println!("Mountpoint server on {}. Press Enter to stop.", args.signal);
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    server.shutdown();
}
