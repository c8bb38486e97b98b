//! Service contract and WebSocket wire protocol.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use http_sink_core::DeliveryOutcome;
use serde::{Deserialize, Serialize};

/// Request to open a session.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    /// Opaque tenant identifier.
    pub tenant_id: String,
    /// JSON-encoded sink config object.
    pub config_json: Vec<u8>,
}

/// Response to a successful `CreateSession`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Request to close a session.
#[derive(Debug, Clone)]
pub struct CloseSessionRequest {
    pub session_id: String,
}

/// One message on a `Write` stream.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Session the stream writes to. Only the first message's value is used.
    pub session_id: String,
    /// Packed batch bytes.
    pub packed_batch: Bytes,
}

/// Per-batch acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl AckResponse {
    #[must_use]
    pub const fn success() -> Self {
        Self {
            success: true,
            error: String::new(),
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

impl From<DeliveryOutcome> for AckResponse {
    fn from(outcome: DeliveryOutcome) -> Self {
        match outcome {
            DeliveryOutcome::Success => Self::success(),
            DeliveryOutcome::Failure { reason } => Self::failure(reason),
        }
    }
}

/// Message from client to server on the write socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A packed batch (base64 encoded).
    Write {
        session_id: String,
        packed_batch: String,
    },
    /// Ping for keepalive.
    Ping,
    /// No more writes. Pending acknowledgments are still sent, then the
    /// server closes the socket.
    End,
}

impl ClientMessage {
    /// Create a write message from raw packed bytes.
    #[must_use]
    pub fn write(session_id: impl Into<String>, packed_batch: &[u8]) -> Self {
        Self::Write {
            session_id: session_id.into(),
            packed_batch: BASE64.encode(packed_batch),
        }
    }

    /// Convert a write message into a `WriteRequest`.
    ///
    /// Returns `None` for other message types.
    ///
    /// # Errors
    /// Returns error if `packed_batch` is not valid base64.
    pub fn into_write_request(self) -> Option<Result<WriteRequest, base64::DecodeError>> {
        match self {
            Self::Write {
                session_id,
                packed_batch,
            } => Some(BASE64.decode(packed_batch).map(|bytes| WriteRequest {
                session_id,
                packed_batch: Bytes::from(bytes),
            })),
            Self::Ping | Self::End => None,
        }
    }
}

/// Message from server to client on the write socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledgment for one batch, in request order.
    Ack {
        success: bool,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        error: String,
    },
    /// The stream was terminated.
    Error { message: String },
    /// Pong response.
    Pong,
}

impl From<AckResponse> for ServerMessage {
    fn from(ack: AckResponse) -> Self {
        Self::Ack {
            success: ack.success,
            error: ack.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_message_decodes() {
        let msg = ClientMessage::write("s1", b"\x00\x00\x00\x00");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"write","session_id":"s1","packed_batch":"AAAAAA=="}"#);

        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        let req = parsed.into_write_request().unwrap().unwrap();
        assert_eq!(req.session_id, "s1");
        assert_eq!(req.packed_batch.as_ref(), b"\x00\x00\x00\x00");
    }

    #[test]
    fn test_bad_base64_is_error() {
        let msg = ClientMessage::Write {
            session_id: "s1".into(),
            packed_batch: "***".into(),
        };
        assert!(msg.into_write_request().unwrap().is_err());
        assert!(ClientMessage::Ping.into_write_request().is_none());
        assert!(ClientMessage::End.into_write_request().is_none());
    }

    #[test]
    fn test_control_messages_wire_shape() {
        let end: ClientMessage = serde_json::from_str(r#"{"type":"end"}"#).unwrap();
        assert!(matches!(end, ClientMessage::End));
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping));
        assert_eq!(
            serde_json::to_string(&ServerMessage::Pong).unwrap(),
            r#"{"type":"pong"}"#
        );
    }

    #[test]
    fn test_ack_wire_shape() {
        let ok = serde_json::to_string(&ServerMessage::from(AckResponse::success())).unwrap();
        assert_eq!(ok, r#"{"type":"ack","success":true}"#);

        let failed = ServerMessage::from(AckResponse::from(DeliveryOutcome::failure("HTTP 500: x")));
        let json = serde_json::to_string(&failed).unwrap();
        assert_eq!(json, r#"{"type":"ack","success":false,"error":"HTTP 500: x"}"#);
    }
}
