//! Client error types.

use std::fmt;

use exerciser_protocol::{CodecError, ProtocolError};
use exerciser_session::SessionError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Wire codec or framing error.
    Protocol(String),
    /// Session lifecycle error.
    Session(SessionError),
    /// A participant did not answer in time.
    Timeout(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Session(err) => write!(f, "session error: {}", err),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Session(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionError> for ClientError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl From<CodecError> for ClientError {
    fn from(err: CodecError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
