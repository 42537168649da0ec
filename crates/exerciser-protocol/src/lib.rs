//! Command codec, message envelopes, framing and ordering for exerciser.
//!
//! Participants in a shared session exchange [`Envelope`]s whose payload is
//! a [`Service`], most often wrapping a [`Command`].
//!
//! # Wire format
//!
//! A command is a map with exactly one key naming the variant:
//!
//! ```text
//! {"driveForward": 0.5}
//! {"driveWithPower": [0.25, 0.25]}
//! {"turnLeft45": -45.0}
//! {"acknowledgment": "driveForward"}
//! ```
//!
//! Envelopes are serialized as JSON and framed with a 4-byte big-endian
//! length prefix before being handed to the messenger.
//!
//! # Example
//!
//! ```rust
//! use exerciser_protocol::{Command, Envelope, Service, decode_message, encode_message};
//!
//! let envelope = Envelope::new(Service::Command(Command::TurnLeft90));
//! let bytes = encode_message(&envelope).unwrap();
//! let decoded: Envelope<Service> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, envelope);
//! ```

mod codec;
mod command;
mod error;
mod framing;
mod ordering;
mod types;

pub use codec::{decode, encode, WireMap};
pub use command::{Command, CommandKey};
pub use error::{CodecError, CodecResult, ProtocolError, ProtocolResult};
pub use framing::{decode_message, encode_message};
pub use ordering::{HighWaterMark, StaleEnvelope};
pub use types::{Envelope, Service};

pub use exerciser_core::StatusSnapshot;

/// Protocol version constant.
pub const PROTOCOL_VERSION: &str = "1";

/// Maximum message size (1 MB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
