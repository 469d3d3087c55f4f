//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding sync messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON encoding or decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// CBOR encoding failed.
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR decoding failed.
    #[error("CBOR decode error: {0}")]
    CborDecode(String),

    /// A frame carried an unknown message type code.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// A frame was empty or truncated.
    #[error("truncated frame")]
    Truncated,

    /// A frame was encoded by an incompatible protocol version.
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this build speaks.
        expected: u8,
        /// Version found in the frame.
        actual: u8,
    },
}
