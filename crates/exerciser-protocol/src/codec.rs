//! Keyed wire form of [`Command`].
//!
//! Each command maps to a single-entry map whose key names the variant and
//! whose value carries the payload:
//!
//! | variant | value |
//! |---|---|
//! | `connected` / `disconnected` | `true` / `false` |
//! | drive, tilt | one number |
//! | `driveWithPower` | `[left, right]` |
//! | turns, stops, `requestStatus` | the fixed canonical number |
//! | `status` | nested status map |
//! | `acknowledgment` | key string of the acknowledged command |
//!
//! Decoding is a single discriminated parse on the one key present; there is
//! no probing of alternative keys.

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{self, Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use exerciser_core::StatusSnapshot;

use crate::command::{Command, CommandKey};
use crate::error::{CodecError, CodecResult};

/// A decoded-but-untyped command map.
pub type WireMap = Map<String, Value>;

/// Payload half of a wire entry.
#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
enum WireValue<'a> {
    Flag(bool),
    Number(f32),
    Pair([f32; 2]),
    Status(&'a StatusSnapshot),
    Key(&'static str),
}

impl WireValue<'_> {
    fn to_json(&self) -> Value {
        match self {
            Self::Flag(flag) => Value::Bool(*flag),
            Self::Number(n) => widen(*n),
            Self::Pair([left, right]) => Value::Array(vec![widen(*left), widen(*right)]),
            // Through text, so the battery levels keep their shortest form.
            Self::Status(status) => serde_json::to_string(status)
                .and_then(|text| serde_json::from_str(&text))
                .unwrap_or(Value::Null),
            Self::Key(key) => Value::String((*key).to_string()),
        }
    }
}

/// Widens through the shortest decimal form, matching what the serializer
/// writes for an `f32`.
fn widen(n: f32) -> Value {
    n.to_string()
        .parse::<f64>()
        .map_or(Value::Null, Value::from)
}

fn wire_entry(command: &Command) -> CodecResult<(CommandKey, WireValue<'_>)> {
    let key = command.key();
    let value = match command {
        Command::Connected => WireValue::Flag(true),
        Command::Disconnected => WireValue::Flag(false),
        Command::DriveForward(speed) | Command::DriveBackward(speed) => WireValue::Number(*speed),
        Command::DriveWithPower(left, right) => WireValue::Pair([*left, *right]),
        Command::TiltForward(angle) | Command::TiltBackward(angle) => WireValue::Number(*angle),
        Command::StopDriving
        | Command::StopTilting
        | Command::TurnLeft45
        | Command::TurnLeft90
        | Command::TurnLeftRear45
        | Command::TurnRight45
        | Command::TurnRight90
        | Command::TurnRightRear45
        | Command::RequestStatus => {
            WireValue::Number(key.canonical_value().unwrap_or_default())
        }
        Command::Status(status) => WireValue::Status(status),
        Command::Acknowledgment(inner) => {
            if inner.is_acknowledgment() {
                return Err(CodecError::NestedAcknowledgment);
            }
            WireValue::Key(inner.key_string())
        }
    };
    Ok((key, value))
}

/// Encodes a command into its single-key wire map.
///
/// # Errors
///
/// Returns [`CodecError::NestedAcknowledgment`] for an acknowledgment of an
/// acknowledgment.
pub fn encode(command: &Command) -> CodecResult<WireMap> {
    let (key, value) = wire_entry(command)?;
    let mut map = WireMap::new();
    map.insert(key.as_str().to_string(), value.to_json());
    Ok(map)
}

/// Decodes a single-key wire map into a command.
///
/// # Errors
///
/// Returns [`CodecError::Decoding`] with a description of the input when the
/// map is empty, has more than one key, names an unknown variant, or carries
/// a payload of the wrong shape. Placeholder variants must carry exactly
/// their canonical value.
pub fn decode(map: &WireMap) -> CodecResult<Command> {
    let mut entries = map.iter();
    let (name, value) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        (None, _) => {
            return Err(CodecError::decoding(format!(
                "empty command map {}",
                describe(map)
            )));
        }
        (Some(_), Some(_)) => {
            return Err(CodecError::decoding(format!(
                "expected exactly one command key, found {} in {}",
                map.len(),
                describe(map)
            )));
        }
    };

    let key = CommandKey::parse(name).ok_or_else(|| {
        CodecError::decoding(format!(
            "unrecognized command key `{}` in {}",
            name,
            describe(map)
        ))
    })?;

    decode_entry(key, value).map_err(|reason| {
        CodecError::decoding(format!(
            "invalid `{}` payload: {} in {}",
            key,
            reason,
            describe(map)
        ))
    })
}

fn decode_entry(key: CommandKey, value: &Value) -> Result<Command, String> {
    match key {
        CommandKey::Connected => flag(value, true).map(|()| Command::Connected),
        CommandKey::Disconnected => flag(value, false).map(|()| Command::Disconnected),
        CommandKey::DriveForward => number(value).map(Command::DriveForward),
        CommandKey::DriveBackward => number(value).map(Command::DriveBackward),
        CommandKey::DriveWithPower => {
            pair(value).map(|(left, right)| Command::DriveWithPower(left, right))
        }
        CommandKey::TiltForward => number(value).map(Command::TiltForward),
        CommandKey::TiltBackward => number(value).map(Command::TiltBackward),
        CommandKey::Status => StatusSnapshot::deserialize(value)
            .map(Command::Status)
            .map_err(|e| e.to_string()),
        CommandKey::Acknowledgment => {
            let acknowledged = acknowledged_key(value)?;
            if acknowledged == CommandKey::Acknowledgment {
                return Err("an acknowledgment cannot acknowledge an acknowledgment".to_string());
            }
            Ok(Command::acknowledge(acknowledged.default_command()))
        }
        placeholder => {
            let expected = placeholder.canonical_value().unwrap_or_default();
            let actual = number(value)?;
            if actual == expected {
                Ok(placeholder.default_command())
            } else {
                Err(format!("expected {} but found {}", expected, actual))
            }
        }
    }
}

fn flag(value: &Value, expected: bool) -> Result<(), String> {
    match value.as_bool() {
        Some(actual) if actual == expected => Ok(()),
        _ => Err(format!("expected {} but found {}", expected, value)),
    }
}

fn number(value: &Value) -> Result<f32, String> {
    let n = value
        .as_f64()
        .ok_or_else(|| format!("expected a number, found {}", value))?;
    let n = n as f32;
    if n.is_finite() {
        Ok(n)
    } else {
        Err(format!("{} does not fit a 32-bit float", value))
    }
}

fn pair(value: &Value) -> Result<(f32, f32), String> {
    match value.as_array().map(Vec::as_slice) {
        Some([left, right]) => Ok((number(left)?, number(right)?)),
        Some(items) => Err(format!("expected 2 numbers, found {}", items.len())),
        None => Err(format!("expected a pair of numbers, found {}", value)),
    }
}

/// The acknowledged command travels as its key. A nested single-key command
/// map is accepted too and reduced to its key.
fn acknowledged_key(value: &Value) -> Result<CommandKey, String> {
    let name = match value {
        Value::String(name) => name.as_str(),
        Value::Object(map) if map.len() == 1 => map.keys().next().map_or("", String::as_str),
        other => return Err(format!("expected a command key, found {}", other)),
    };
    CommandKey::parse(name).ok_or_else(|| format!("unrecognized acknowledged command `{}`", name))
}

fn describe(map: &WireMap) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| format!("{:?}", map))
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (key, value) = wire_entry(self).map_err(ser::Error::custom)?;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(key.as_str(), &value)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = WireMap::deserialize(deserializer)?;
        decode(&map).map_err(de::Error::custom)
    }
}
