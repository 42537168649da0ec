//! Receiver-side "latest wins" filter.
//!
//! The transport neither orders nor deduplicates. A receiver keeps the
//! newest timestamp it has accepted and rejects anything at or before it.
//! The filter looks only at timestamps, so it works for any payload type.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::types::Envelope;

/// An envelope rejected because it is not newer than the high-water mark.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("message {id} past its sell-by date: {timestamp} is not after {latest}")]
pub struct StaleEnvelope {
    /// Identifier of the rejected envelope.
    pub id: Uuid,
    /// Capture time of the rejected envelope.
    pub timestamp: DateTime<Utc>,
    /// The high-water mark it was compared against.
    pub latest: DateTime<Utc>,
}

/// Monotonic high-water mark over accepted envelope timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighWaterMark {
    latest: DateTime<Utc>,
}

impl Default for HighWaterMark {
    fn default() -> Self {
        Self::new()
    }
}

impl HighWaterMark {
    /// Creates a mark at the earliest representable instant; the first
    /// envelope is always accepted.
    pub fn new() -> Self {
        Self {
            latest: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Returns the newest accepted timestamp.
    pub fn latest(&self) -> DateTime<Utc> {
        self.latest
    }

    /// Accepts `envelope` if it is strictly newer than everything accepted so
    /// far, advancing the mark.
    ///
    /// # Errors
    ///
    /// Returns [`StaleEnvelope`] and leaves the mark unchanged otherwise.
    pub fn admit<T>(&mut self, envelope: &Envelope<T>) -> Result<(), StaleEnvelope> {
        if envelope.is_newer_than(self.latest) {
            self.latest = envelope.timestamp;
            Ok(())
        } else {
            Err(StaleEnvelope {
                id: envelope.id,
                timestamp: envelope.timestamp,
                latest: self.latest,
            })
        }
    }

    /// Forgets every accepted timestamp.
    pub fn reset(&mut self) {
        self.latest = DateTime::<Utc>::MIN_UTC;
    }
}
