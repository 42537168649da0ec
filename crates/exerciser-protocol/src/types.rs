//! Envelope and payload types for the exerciser protocol.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PROTOCOL_VERSION;
use crate::command::Command;

/// Message envelope wrapping every payload sent through a session.
///
/// The identifier and capture timestamp are assigned once, at send time.
/// Receivers use the timestamp for "latest wins" ordering (see
/// [`HighWaterMark`](crate::HighWaterMark)) and the whole envelope's
/// [`Display`](fmt::Display) rendering for tracing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Unique message identifier.
    pub id: Uuid,
    /// When the payload was captured.
    pub timestamp: DateTime<Utc>,
    /// The actual payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Stamps `payload` with a fresh identifier and the current time.
    pub fn new(payload: T) -> Self {
        Self::with_parts(Uuid::new_v4(), Utc::now(), payload)
    }

    /// Builds an envelope from explicit parts.
    pub fn with_parts(id: Uuid, timestamp: DateTime<Utc>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            id,
            timestamp,
            payload,
        }
    }

    /// Returns the protocol version.
    pub fn version(&self) -> &str {
        &self.protocol_version
    }

    /// Checks if this envelope uses a compatible protocol version.
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }

    /// Returns true if this envelope was captured strictly after `instant`.
    pub fn is_newer_than(&self, instant: DateTime<Utc>) -> bool {
        self.timestamp > instant
    }

    /// Maps the payload, keeping identifier and timestamp.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            protocol_version: self.protocol_version,
            id: self.id,
            timestamp: self.timestamp,
            payload: f(self.payload),
        }
    }
}

/// `<ISO-8601 timestamp> <identifier> <payload description>`
impl<T: fmt::Display> fmt::Display for Envelope<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.id.hyphenated().to_string().to_uppercase(),
            self.payload
        )
    }
}

/// Payloads exchanged by exerciser participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Service {
    /// Ask the other participants which services they offer.
    RequestServices,
    /// A robot command or event.
    Command(Command),
}

impl Service {
    /// Returns the wrapped command, if any.
    pub fn command(&self) -> Option<&Command> {
        match self {
            Self::Command(command) => Some(command),
            Self::RequestServices => None,
        }
    }
}

impl From<Command> for Service {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestServices => write!(f, "Request Exerciser Services"),
            Self::Command(command) => write!(f, "Command {}", command),
        }
    }
}
