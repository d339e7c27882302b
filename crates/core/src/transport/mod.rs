//! Signaling channel transport.
//!
//! The signaling channel is assumed to be a reliable, ordered,
//! bidirectional text channel. This module provides the concrete
//! line-delimited TCP flavor used by the server and tests:
//!
//! - **Outbound** ([`tcp::TcpSink`]): one UTF-8 frame per line.
//! - **Inbound** ([`tcp::read_loop`]): a reader thread that posts each
//!   line into the reactor queue and signals channel close on EOF.
//!
//! Frames never carry embedded newlines: control commands are single
//! lines by construction and the JSON layer serializes compactly.

pub mod tcp;

pub use tcp::TcpSink;
