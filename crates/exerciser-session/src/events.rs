//! Notifications published by the lifecycle manager.
//!
//! The observer is a channel, never an owner: dropping the receiver silences
//! the manager without affecting its lifetime.

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::mpsc;

use exerciser_protocol::Envelope;

use crate::error::SessionError;
use crate::transport::Participant;

/// Payload types the manager can carry.
pub trait SessionMessage:
    Serialize + DeserializeOwned + fmt::Display + fmt::Debug + Clone + Send + Sync + 'static
{
}

impl<T> SessionMessage for T where
    T: Serialize + DeserializeOwned + fmt::Display + fmt::Debug + Clone + Send + Sync + 'static
{
}

/// One notification to the observer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent<M> {
    /// The local participant joined the adopted session.
    Connected,
    /// The adopted session was invalidated by the transport.
    Disconnected { reason: String },
    /// The joined participant count changed.
    ParticipantsChanged { count: usize },
    /// Description of the adopted session's latest state.
    StatusChanged { status: String },
    /// An inbound envelope passed the ordering filter.
    MessageReceived {
        envelope: Envelope<M>,
        sender: Participant,
    },
    /// A non-fatal failure.
    Error(SessionError),
}

impl<M> SessionEvent<M> {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::ParticipantsChanged { .. } => "participants_changed",
            Self::StatusChanged { .. } => "status_changed",
            Self::MessageReceived { .. } => "message_received",
            Self::Error(_) => "error",
        }
    }
}

impl<M: fmt::Display> fmt::Display for SessionEvent<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected { reason } => write!(f, "disconnected: {}", reason),
            Self::ParticipantsChanged { count } => write!(f, "participants: {}", count),
            Self::StatusChanged { status } => write!(f, "session {}", status),
            Self::MessageReceived { envelope, sender } => {
                write!(f, "from {}: {}", sender.name, envelope)
            }
            Self::Error(error) => write!(f, "error: {}", error),
        }
    }
}

/// Sending half of the observer channel.
#[derive(Debug)]
pub(crate) struct EventSink<M> {
    tx: mpsc::UnboundedSender<SessionEvent<M>>,
}

impl<M> EventSink<M> {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent<M>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publishes an event. A dropped observer is not an error.
    pub(crate) fn emit(&self, event: SessionEvent<M>) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exerciser_protocol::Service;

    #[test]
    fn emit_after_observer_dropped_is_silent() {
        let (sink, rx) = EventSink::<Service>::channel();
        drop(rx);
        sink.emit(SessionEvent::Connected);
    }

    #[test]
    fn event_descriptions() {
        let event: SessionEvent<Service> = SessionEvent::Error(SessionError::NoMessenger);
        assert_eq!(event.kind(), "error");
        assert_eq!(
            event.to_string(),
            "error: attempted to send a message using a nonexistent messenger"
        );

        let event: SessionEvent<Service> = SessionEvent::StatusChanged {
            status: "joined".to_string(),
        };
        assert_eq!(event.to_string(), "session joined");
    }
}
