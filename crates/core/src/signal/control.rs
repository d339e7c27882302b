//! Plain-text control commands.
//!
//! The signaling server drives session membership with a small line
//! grammar, separate from the JSON envelopes the browser clients send:
//!
//! ```text
//! Server -> us:  REGISTERED
//!                BIND-SESSION-CLIENT <uid>
//!                UNBIND-SESSION-CLIENT <uid>
//!                ERROR <text>
//! Us -> server:  REGISTER MEDIA
//!                SESSION <uid> BOUND
//!                SESSION <uid> UNBOUND
//! ```

/// Sent once the channel opens to announce ourselves as the media source.
pub const REGISTER_MEDIA: &str = "REGISTER MEDIA";

/// A parsed inbound control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// The signaling server accepted our registration.
    Registered,
    /// Bind a client session.
    Bind(u32),
    /// Unbind a client session.
    Unbind(u32),
    /// Server-reported error text.
    Error(String),
}

impl ControlMessage {
    /// Try to parse a frame as a control command.
    ///
    /// Returns `None` when the frame matches none of the grammar; the
    /// router then tries the JSON envelope layer.
    pub fn parse(frame: &str) -> Option<Self> {
        let frame = frame.trim_end_matches(['\r', '\n']);
        if frame == "REGISTERED" {
            return Some(Self::Registered);
        }
        if let Some(rest) = frame.strip_prefix("BIND-SESSION-CLIENT ") {
            return rest.trim().parse().ok().map(Self::Bind);
        }
        if let Some(rest) = frame.strip_prefix("UNBIND-SESSION-CLIENT ") {
            return rest.trim().parse().ok().map(Self::Unbind);
        }
        if frame == "ERROR" {
            return Some(Self::Error(String::new()));
        }
        if let Some(rest) = frame.strip_prefix("ERROR ") {
            return Some(Self::Error(rest.trim_start().to_string()));
        }
        None
    }
}

/// Reply confirming a successful bind.
pub fn session_bound(client_uid: u32) -> String {
    format!("SESSION {client_uid} BOUND")
}

/// Reply confirming a successful unbind.
pub fn session_unbound(client_uid: u32) -> String {
    format!("SESSION {client_uid} UNBOUND")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_registered() {
        assert_eq!(
            ControlMessage::parse("REGISTERED"),
            Some(ControlMessage::Registered)
        );
    }

    #[test]
    fn parse_bind_unbind() {
        assert_eq!(
            ControlMessage::parse("BIND-SESSION-CLIENT 7"),
            Some(ControlMessage::Bind(7))
        );
        assert_eq!(
            ControlMessage::parse("UNBIND-SESSION-CLIENT 42"),
            Some(ControlMessage::Unbind(42))
        );
    }

    #[test]
    fn parse_error_text() {
        assert_eq!(
            ControlMessage::parse("ERROR something went wrong"),
            Some(ControlMessage::Error("something went wrong".to_string()))
        );
        assert_eq!(
            ControlMessage::parse("ERROR"),
            Some(ControlMessage::Error(String::new()))
        );
    }

    #[test]
    fn parse_strips_line_endings() {
        assert_eq!(
            ControlMessage::parse("BIND-SESSION-CLIENT 7\r\n"),
            Some(ControlMessage::Bind(7))
        );
    }

    #[test]
    fn non_control_frames_fall_through() {
        assert_eq!(ControlMessage::parse("{\"client_uid\":7}"), None);
        assert_eq!(ControlMessage::parse("BIND-SESSION-CLIENT abc"), None);
        assert_eq!(ControlMessage::parse("REGISTERED NOW"), None);
        assert_eq!(ControlMessage::parse("ERRORX"), None);
    }

    #[test]
    fn reply_frames() {
        assert_eq!(session_bound(7), "SESSION 7 BOUND");
        assert_eq!(session_unbound(7), "SESSION 7 UNBOUND");
    }
}
