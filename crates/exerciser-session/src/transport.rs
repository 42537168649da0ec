//! Contracts for the group-session transport.
//!
//! The lifecycle manager drives an [`Activity`] and the [`GroupSession`]s it
//! offers, and exchanges opaque frames through a session's [`Messenger`].
//! None of these are implemented here; [`crate::loopback`] provides an
//! in-process implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransportError;

/// A boxed future for async trait methods.
///
/// Keeps the contracts object-safe so the manager can hold
/// `Arc<dyn Activity>` without knowing the concrete transport.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle state of one session instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Offered but not yet joined.
    Waiting,
    /// The local participant has joined.
    Joined,
    /// Torn down; terminal for this instance.
    Invalidated {
        /// Why the session ended.
        reason: String,
    },
}

impl SessionState {
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined)
    }

    pub fn is_invalidated(&self) -> bool {
        matches!(self, Self::Invalidated { .. })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Joined => write!(f, "joined"),
            Self::Invalidated { reason } => write!(f, "invalidated: {}", reason),
        }
    }
}

/// A member of a group session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
}

impl Participant {
    /// Creates a participant with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A frame delivered by a messenger, with the participant that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub data: Vec<u8>,
    pub sender: Participant,
}

/// Describes the shared activity to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMetadata {
    /// Stable activity type identifier.
    pub identifier: String,
    pub title: String,
    pub subtitle: Option<String>,
}

impl Default for ActivityMetadata {
    fn default() -> Self {
        Self {
            identifier: "org.exerciser.group-activity".to_string(),
            title: "Exerciser".to_string(),
            subtitle: Some("Drive a robot together".to_string()),
        }
    }
}

impl ActivityMetadata {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            subtitle: None,
        }
    }

    /// Builder: set the subtitle.
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }
}

/// A shareable activity and the source of the sessions formed for it.
pub trait Activity: Send + Sync {
    /// Describes the activity.
    fn metadata(&self) -> &ActivityMetadata;

    /// Asks the transport to start the activity.
    ///
    /// Success means the request was accepted; any resulting session arrives
    /// later through [`sessions`](Self::sessions).
    fn activate(&self) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Stream of sessions offered after the call, one per formed session.
    ///
    /// The stream is unbounded and may be requested again after being dropped.
    fn sessions(&self) -> BoxStream<'static, Arc<dyn GroupSession>>;
}

/// One session instance.
pub trait GroupSession: Send + Sync {
    fn id(&self) -> Uuid;

    /// The current state.
    fn state(&self) -> SessionState;

    /// The current state, then every later change in transport order.
    fn state_changes(&self) -> BoxStream<'static, SessionState>;

    /// Number of participants that have joined.
    fn participant_count(&self) -> usize;

    /// The current participant count, then every later change.
    fn participant_counts(&self) -> BoxStream<'static, usize>;

    /// Joins the session. The transport reports success as a state change.
    fn join(&self);

    /// Leaves the session, invalidating it locally.
    fn leave(&self);

    /// Creates a messenger bound to this session.
    fn messenger(&self) -> Arc<dyn Messenger>;
}

/// Send and receive handle bound to one session.
pub trait Messenger: Send + Sync {
    /// Delivers a frame to the other participants.
    fn send(&self, frame: Vec<u8>) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Stream of frames received after the call.
    fn messages(&self) -> BoxStream<'static, InboundMessage>;
}
