//! Session and transport error types.

use thiserror::Error;
use uuid::Uuid;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Failures reported by the transport collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device cannot form a session right now.
    #[error("not eligible to start a group session")]
    NotEligible,

    /// Sending requires the local participant to have joined.
    #[error("local participant has not joined the session")]
    NotJoined,

    /// The session or messenger is gone.
    #[error("transport closed")]
    Closed,

    /// The transport refused the operation.
    #[error("transport rejected the request: {0}")]
    Rejected(String),
}

/// Errors surfaced by the lifecycle manager.
///
/// Every variant is non-fatal. Besides being returned where an operation has
/// a caller, each is published to the observer as
/// [`SessionEvent::Error`](crate::SessionEvent::Error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The operation needs an adopted session.
    #[error("no group session")]
    NoSession,

    /// A send was attempted before a messenger was acquired.
    #[error("attempted to send a message using a nonexistent messenger")]
    NoMessenger,

    /// The transport failed to deliver an outgoing message.
    #[error("activity message send failure: {0}")]
    SendFailed(TransportError),

    /// An inbound message was not newer than the last accepted one.
    #[error("message past its sell-by date: {description}")]
    StaleMessage {
        /// Identifier of the rejected envelope.
        id: Uuid,
        /// Human-readable rendering of the rejected envelope.
        description: String,
    },

    /// An inbound message could not be decoded.
    #[error("failed to decode inbound message: {0}")]
    DecodingFailed(String),

    /// An outbound payload could not be encoded.
    #[error("failed to encode outbound message: {0}")]
    EncodingFailed(String),

    /// The activity could not be started.
    #[error("failed to activate group activity: {0}")]
    ActivationFailed(TransportError),
}

impl SessionError {
    /// Returns true for the expected outcome of the ordering filter.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleMessage { .. })
    }
}
