//! # Error Types
//!
//! Error taxonomy shared across the transport crates.

use crate::ids::{NodeUuid, ProcessUuid};
use thiserror::Error;

/// Errors reported by transport operations.
///
/// Public node operations translate these into booleans, handles or
/// outcomes; they never cross the boundary as panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// `(topic, puuid, nuuid)` is already advertised.
    #[error("Duplicate registration: {topic} already advertised by {puuid}/{nuuid}")]
    DuplicateRegistration {
        topic: String,
        puuid: ProcessUuid,
        nuuid: NodeUuid,
    },

    /// Empty or malformed topic, service or type name.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A frame could not be sent.
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// A payload did not decode against its declared type.
    #[error("Decode failure for {type_name}: {reason}")]
    DecodeFailure { type_name: String, reason: String },

    /// The caller's type does not match the advertised type.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// The endpoint is not (or no longer) advertised.
    #[error("Not advertised: {0}")]
    NotAdvertised(String),

    /// Unrecoverable resource failure at startup.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Errors from the message codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Failed to encode {type_name}: {reason}")]
    Encode { type_name: String, reason: String },

    #[error("Failed to decode {type_name}: {reason}")]
    Decode { type_name: String, reason: String },

    /// The factory has no entry for this type name.
    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

impl From<CodecError> for TransportError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Decode { type_name, reason } | CodecError::Encode { type_name, reason } => {
                TransportError::DecodeFailure { type_name, reason }
            }
            CodecError::UnknownType(type_name) => TransportError::DecodeFailure {
                type_name,
                reason: "unknown message type".to_string(),
            },
        }
    }
}

/// Errors from frame encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("Unsupported version: received {received}, supported {supported}")]
    UnsupportedVersion { received: u16, supported: u16 },

    #[error("Frame encode failed: {0}")]
    Encode(String),

    #[error("Frame decode failed: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_maps_to_decode_failure() {
        let err: TransportError = CodecError::UnknownType("x.Y".into()).into();
        assert!(matches!(
            err,
            TransportError::DecodeFailure { ref type_name, .. } if type_name == "x.Y"
        ));
    }

    #[test]
    fn test_display_mentions_topic() {
        let err = TransportError::DuplicateRegistration {
            topic: "/twist".into(),
            puuid: ProcessUuid::new(),
            nuuid: NodeUuid::new(),
        };
        assert!(err.to_string().contains("/twist"));
    }
}
