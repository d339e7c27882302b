//! JSON envelopes forwarded from browser clients.
//!
//! Every envelope carries a mandatory `client_uid` plus exactly one of
//! three bodies:
//!
//! ```text
//! {"client_uid": 7, "command": {"type": "connect-to-mountpoint"}}
//! {"client_uid": 7, "sdp": {"type": "answer", "sdp": "v=0..."}}
//! {"client_uid": 7, "ice": {"candidate": "...", "sdpMLineIndex": 0}}
//! ```
//!
//! Replies echo the inbound object augmented with `success: true`, or
//! `success: false` plus a `"return-message"`. Envelopes with none of the
//! three bodies are forward-compatible unknowns: logged and ignored, not
//! an error.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ProtocolError;

/// A mountpoint command from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    ConnectToMountpoint,
    DisconnectMountpoint,
}

/// The one body an envelope carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeBody {
    Command(CommandKind),
    /// The peer's SDP answer to our offer.
    Answer { sdp: String },
    /// A remote ICE candidate.
    Ice { line_index: u32, candidate: String },
    /// None of the known bodies; kept so the router can log and skip it.
    Unknown,
}

/// A parsed envelope, keeping the raw object for reply echoing.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub client_uid: u32,
    pub body: EnvelopeBody,
    raw: Value,
}

#[derive(Deserialize)]
struct SdpBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    sdp: Option<String>,
}

#[derive(Deserialize)]
struct IceBody {
    candidate: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    line_index: Option<u32>,
}

impl Envelope {
    /// Parse a frame as a JSON envelope.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|_| ProtocolError::Malformed(text.to_string()))?;
        let object = raw
            .as_object()
            .ok_or_else(|| ProtocolError::Malformed(text.to_string()))?;

        let client_uid = object
            .get("client_uid")
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::MissingClientUid)? as u32;

        let body = if let Some(command) = object.get("command") {
            let kind = command
                .get("type")
                .and_then(Value::as_str)
                .ok_or(ProtocolError::MissingCommandType)?;
            match kind {
                "connect-to-mountpoint" => EnvelopeBody::Command(CommandKind::ConnectToMountpoint),
                "disconnect-mountpoint" => {
                    EnvelopeBody::Command(CommandKind::DisconnectMountpoint)
                }
                other => return Err(ProtocolError::UnknownCommand(other.to_string())),
            }
        } else if let Some(sdp) = object.get("sdp") {
            let body: SdpBody = serde_json::from_value(sdp.clone())
                .map_err(|_| ProtocolError::Malformed(text.to_string()))?;
            match body.kind.as_deref() {
                Some("answer") => {}
                Some(other) => return Err(ProtocolError::NotAnAnswer(other.to_string())),
                None => return Err(ProtocolError::MissingSdpType),
            }
            let sdp = body
                .sdp
                .ok_or_else(|| ProtocolError::Malformed("sdp body without 'sdp'".to_string()))?;
            EnvelopeBody::Answer { sdp }
        } else if let Some(ice) = object.get("ice") {
            let body: IceBody = serde_json::from_value(ice.clone())
                .map_err(|_| ProtocolError::Malformed(text.to_string()))?;
            match (body.candidate, body.line_index) {
                (Some(candidate), Some(line_index)) => EnvelopeBody::Ice {
                    line_index,
                    candidate,
                },
                _ => {
                    return Err(ProtocolError::Malformed(
                        "ice body without candidate/sdpMLineIndex".to_string(),
                    ));
                }
            }
        } else {
            EnvelopeBody::Unknown
        };

        Ok(Envelope {
            client_uid,
            body,
            raw,
        })
    }

    /// Echo of the inbound envelope with `success: true`.
    pub fn success_reply(&self) -> String {
        let mut reply = self.raw.clone();
        if let Some(object) = reply.as_object_mut() {
            object.insert("success".to_string(), Value::Bool(true));
        }
        reply.to_string()
    }

    /// Echo of the inbound envelope with `success: false` and the error.
    pub fn failure_reply(&self, message: &str) -> String {
        let mut reply = self.raw.clone();
        if let Some(object) = reply.as_object_mut() {
            object.insert("success".to_string(), Value::Bool(false));
            object.insert(
                "return-message".to_string(),
                Value::String(message.to_string()),
            );
        }
        reply.to_string()
    }
}

/// Outbound SDP offer envelope.
pub fn offer_message(client_uid: u32, sdp: &str) -> String {
    json!({
        "sdp": {"type": "offer", "sdp": sdp},
        "client_uid": client_uid,
    })
    .to_string()
}

/// Outbound ICE candidate envelope.
pub fn ice_message(client_uid: u32, line_index: u32, candidate: &str) -> String {
    json!({
        "ice": {"candidate": candidate, "sdpMLineIndex": line_index},
        "client_uid": client_uid,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_connect_command() {
        let env =
            Envelope::parse(r#"{"client_uid":7,"command":{"type":"connect-to-mountpoint"}}"#)
                .unwrap();
        assert_eq!(env.client_uid, 7);
        assert_eq!(
            env.body,
            EnvelopeBody::Command(CommandKind::ConnectToMountpoint)
        );
    }

    #[test]
    fn parse_answer() {
        let env =
            Envelope::parse(r#"{"client_uid":7,"sdp":{"type":"answer","sdp":"v=0"}}"#).unwrap();
        assert_eq!(
            env.body,
            EnvelopeBody::Answer {
                sdp: "v=0".to_string()
            }
        );
    }

    #[test]
    fn parse_ice() {
        let env = Envelope::parse(
            r#"{"client_uid":7,"ice":{"candidate":"candidate:1","sdpMLineIndex":2}}"#,
        )
        .unwrap();
        assert_eq!(
            env.body,
            EnvelopeBody::Ice {
                line_index: 2,
                candidate: "candidate:1".to_string()
            }
        );
    }

    #[test]
    fn missing_client_uid_is_protocol_error() {
        let err = Envelope::parse(r#"{"command":{"type":"connect-to-mountpoint"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingClientUid));
    }

    #[test]
    fn command_without_type_is_protocol_error() {
        let err = Envelope::parse(r#"{"client_uid":7,"command":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingCommandType));
    }

    #[test]
    fn offer_from_peer_is_rejected() {
        let err =
            Envelope::parse(r#"{"client_uid":7,"sdp":{"type":"offer","sdp":"v=0"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::NotAnAnswer(_)));
    }

    #[test]
    fn unknown_body_is_not_an_error() {
        let env = Envelope::parse(r#"{"client_uid":7,"stats":{"rtt":3}}"#).unwrap();
        assert_eq!(env.body, EnvelopeBody::Unknown);
    }

    #[test]
    fn replies_echo_the_original_object() {
        let env =
            Envelope::parse(r#"{"client_uid":7,"command":{"type":"connect-to-mountpoint"}}"#)
                .unwrap();

        let ok: Value = serde_json::from_str(&env.success_reply()).unwrap();
        assert_eq!(ok["client_uid"], 7);
        assert_eq!(ok["command"]["type"], "connect-to-mountpoint");
        assert_eq!(ok["success"], true);

        let fail: Value = serde_json::from_str(&env.failure_reply("mountpoint is not playing"))
            .unwrap();
        assert_eq!(fail["success"], false);
        assert_eq!(fail["return-message"], "mountpoint is not playing");
    }

    #[test]
    fn outbound_offer_shape() {
        let msg: Value = serde_json::from_str(&offer_message(7, "v=0")).unwrap();
        assert_eq!(msg["client_uid"], 7);
        assert_eq!(msg["sdp"]["type"], "offer");
        assert_eq!(msg["sdp"]["sdp"], "v=0");
    }

    #[test]
    fn outbound_ice_shape() {
        let msg: Value = serde_json::from_str(&ice_message(7, 1, "candidate:9")).unwrap();
        assert_eq!(msg["client_uid"], 7);
        assert_eq!(msg["ice"]["candidate"], "candidate:9");
        assert_eq!(msg["ice"]["sdpMLineIndex"], 1);
    }
}
