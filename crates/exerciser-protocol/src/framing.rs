//! Length-prefixed message frames handed to the messenger.
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON envelope   |
//! +----------------+------------------+
//! ```
//!
//! The messenger treats frames as opaque bytes; the prefix lets a receiver
//! detect truncated deliveries before attempting to parse.

use serde::{Serialize, de::DeserializeOwned};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

const PREFIX_LEN: usize = 4;

/// Encodes a message into a complete frame.
///
/// # Example
///
/// ```rust
/// use exerciser_protocol::{encode_message, Envelope, Service};
///
/// let envelope = Envelope::new(Service::RequestServices);
/// let bytes = encode_message(&envelope).unwrap();
/// assert!(bytes.len() > 4);
/// ```
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;

    let len = u32::try_from(json.len()).map_err(|_| ProtocolError::MessageTooLarge {
        size: u32::MAX,
        max: MAX_MESSAGE_SIZE,
    })?;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(PREFIX_LEN + json.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Decodes a complete frame.
///
/// Bytes after the declared length are ignored.
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    let Some((prefix, rest)) = data.split_first_chunk::<PREFIX_LEN>() else {
        return Err(ProtocolError::IncompleteMessage {
            expected: PREFIX_LEN,
            received: data.len(),
        });
    };

    let len = u32::from_be_bytes(*prefix);
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }

    let len = len as usize;
    let Some(json) = rest.get(..len) else {
        return Err(ProtocolError::IncompleteMessage {
            expected: PREFIX_LEN + len,
            received: data.len(),
        });
    };

    Ok(serde_json::from_slice(json)?)
}
