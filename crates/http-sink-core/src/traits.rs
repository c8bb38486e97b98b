//! Shared identifiers, the batch decoding seam and delivery outcomes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::{Batch, DecodeError, unpack_batch};

/// Session identifier.
pub type SessionId = Uuid;

/// Trait for turning a packed wire batch into records.
///
/// The stream handler only depends on this seam, so hosts can plug in the
/// codec their upstream pipeline speaks.
pub trait BatchDecoder: Send + Sync {
    /// Decode a packed batch.
    ///
    /// # Errors
    /// Returns error if the packed bytes are malformed.
    fn decode(&self, packed: Bytes) -> Result<Batch, DecodeError>;
}

/// Decoder for the length-prefixed packed batch format.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackedBatchDecoder;

impl BatchDecoder for PackedBatchDecoder {
    fn decode(&self, packed: Bytes) -> Result<Batch, DecodeError> {
        unpack_batch(packed)
    }
}

/// Result of delivering one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The endpoint accepted the batch.
    Success,
    /// The batch could not be delivered.
    Failure { reason: String },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure { reason } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::pack_batch;

    #[test]
    fn test_packed_decoder() {
        let decoder: &dyn BatchDecoder = &PackedBatchDecoder;
        let batch = decoder.decode(pack_batch([b"1", b"2"]).unwrap()).unwrap();
        assert_eq!(batch.len(), 2);

        let err = decoder.decode(Bytes::from_static(b"\x00")).unwrap_err();
        assert_eq!(err, DecodeError::TruncatedHeader(1));
    }

    #[test]
    fn test_outcome_accessors() {
        assert!(DeliveryOutcome::Success.is_success());
        assert_eq!(DeliveryOutcome::Success.reason(), None);

        let failed = DeliveryOutcome::failure("HTTP 500: boom");
        assert!(!failed.is_success());
        assert_eq!(failed.reason(), Some("HTTP 500: boom"));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&DeliveryOutcome::failure("x")).unwrap();
        assert_eq!(json, r#"{"status":"failure","reason":"x"}"#);
    }
}
