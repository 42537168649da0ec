//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Result type for command encoding and decoding.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while mapping a command to or from its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// An acknowledgment may only wrap a non-acknowledgment command.
    #[error("attempt to encode an acknowledgment of an acknowledgment")]
    NestedAcknowledgment,

    /// The input is not a valid command map.
    #[error("decoding failed: {message}")]
    Decoding { message: String },
}

impl CodecError {
    /// Creates a decoding error.
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }
}

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },

    /// Failed to serialize or deserialize a message.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid protocol version in message.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Incomplete message (frame shorter than its length prefix).
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    /// Empty message received.
    #[error("empty message")]
    EmptyMessage,

    /// Command codec error.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
