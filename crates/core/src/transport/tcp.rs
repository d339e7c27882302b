use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use crate::error::ChannelError;
use crate::reactor::ReactorEvent;
use crate::signal::SignalSink;

/// Outbound half of the line-framed TCP signaling channel.
pub struct TcpSink {
    stream: TcpStream,
}

impl TcpSink {
    pub fn new(stream: TcpStream) -> Self {
        TcpSink { stream }
    }
}

impl SignalSink for TcpSink {
    fn send_text(&mut self, frame: &str) -> Result<(), ChannelError> {
        self.stream.write_all(frame.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()?;
        Ok(())
    }
}

/// Inbound frame loop. Runs on its own thread; every line becomes a
/// [`ReactorEvent::Frame`] and EOF or a read error becomes
/// [`ReactorEvent::ChannelClosed`].
///
/// Checks `running` between frames so shutdown (which also closes the
/// socket to unblock the read) terminates it promptly.
pub fn read_loop(
    stream: TcpStream,
    queue: mpsc::Sender<ReactorEvent>,
    running: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(stream);

    while running.load(Ordering::SeqCst) {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let frame = line.trim_end_matches(['\r', '\n']);
                if frame.is_empty() {
                    continue;
                }
                if queue.send(ReactorEvent::Frame(frame.to_string())).is_err() {
                    return;
                }
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "signaling read error");
                }
                break;
            }
        }
    }

    let _ = queue.send(ReactorEvent::ChannelClosed);
    tracing::debug!("signaling read loop exited");
}
