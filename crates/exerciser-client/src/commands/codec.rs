//! Wire codec commands: `keys`, `encode`, `decode`.

use exerciser_core::StatusSnapshot;
use exerciser_protocol::{
    Command, CommandKey, WireMap, decode as decode_wire, encode as encode_wire,
};

use crate::error::{ClientError, ClientResult};

/// Print every wire key with its default command.
pub fn keys() -> ClientResult<()> {
    println!("{}", keys_table());
    Ok(())
}

/// One line per key: the wire spelling, then the default command.
pub fn keys_table() -> String {
    CommandKey::ALL
        .iter()
        .map(|key| format!("{:<16} {}", key.as_str(), key.default_command()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print the wire JSON for `key` with `values` as its payload.
pub fn encode(key: &str, values: &[String]) -> ClientResult<()> {
    println!("{}", encoded(key, values)?);
    Ok(())
}

/// Builds the command named by `key` and renders its wire JSON.
pub fn encoded(key: &str, values: &[String]) -> ClientResult<String> {
    let command = build_command(key, values)?;
    let map = encode_wire(&command)?;
    serde_json::to_string(&map).map_err(|e| ClientError::Protocol(e.to_string()))
}

/// Print the description of a wire map.
pub fn decode(json: &str) -> ClientResult<()> {
    println!("{}", decoded(json)?);
    Ok(())
}

/// Decodes a wire map and returns the command's description.
pub fn decoded(json: &str) -> ClientResult<String> {
    let map: WireMap = serde_json::from_str(json)
        .map_err(|e| ClientError::Protocol(format!("not a JSON object: {}", e)))?;
    let command = decode_wire(&map)?;
    Ok(command.to_string())
}

/// Resolves `key` to a command, overriding its default payload with `values`.
pub fn build_command(key: &str, values: &[String]) -> ClientResult<Command> {
    let key = CommandKey::parse(key)
        .ok_or_else(|| ClientError::Protocol(format!("unknown command key `{}`", key)))?;

    match key {
        CommandKey::Acknowledgment => {
            let [acknowledged] = values else {
                return Err(ClientError::Protocol(
                    "`acknowledgment` takes exactly one command key".to_string(),
                ));
            };
            // An acknowledged `acknowledgment` is left for the encoder to reject.
            let inner = CommandKey::parse(acknowledged)
                .map(CommandKey::default_command)
                .ok_or_else(|| {
                    ClientError::Protocol(format!("unknown command key `{}`", acknowledged))
                })?;
            return Ok(Command::acknowledge(inner));
        }
        CommandKey::Status => {
            return match values {
                [] => Ok(Command::Status(StatusSnapshot::none())),
                [name] => Ok(Command::Status(StatusSnapshot::none().with_robot_name(name))),
                _ => Err(ClientError::Protocol(
                    "`status` takes at most a robot name".to_string(),
                )),
            };
        }
        _ => {}
    }

    let numbers = values
        .iter()
        .map(|value| {
            value
                .parse::<f32>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| ClientError::Protocol(format!("`{}` is not a number", value)))
        })
        .collect::<ClientResult<Vec<_>>>()?;

    let command = match (key.default_command(), numbers.as_slice()) {
        (command, []) => command,
        (Command::DriveForward(_), [speed]) => Command::DriveForward(*speed),
        (Command::DriveBackward(_), [speed]) => Command::DriveBackward(*speed),
        (Command::TiltForward(_), [angle]) => Command::TiltForward(*angle),
        (Command::TiltBackward(_), [angle]) => Command::TiltBackward(*angle),
        (Command::DriveWithPower(_, right), [left]) => Command::DriveWithPower(*left, right),
        (Command::DriveWithPower(..), [left, right]) => Command::DriveWithPower(*left, *right),
        (_, values) => {
            return Err(ClientError::Protocol(format!(
                "`{}` does not take {} value(s)",
                key,
                values.len()
            )));
        }
    };
    Ok(command)
}
