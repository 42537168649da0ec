//! The command vocabulary exchanged between participants.

use std::fmt;

use exerciser_core::StatusSnapshot;

/// One instruction or event in the protocol.
///
/// Speeds are in metres per second, angles in degrees and powers in
/// `-1.0..=1.0`. An `Acknowledgment` names the command it confirms; it never
/// wraps another acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connected,
    Disconnected,

    DriveForward(f32),
    DriveBackward(f32),
    DriveWithPower(f32, f32),
    StopDriving,
    TiltForward(f32),
    TiltBackward(f32),
    StopTilting,
    TurnLeft45,
    TurnLeft90,
    TurnLeftRear45,
    TurnRight45,
    TurnRight90,
    TurnRightRear45,

    RequestStatus,
    Status(StatusSnapshot),

    Acknowledgment(Box<Command>),
}

impl Command {
    /// Wraps `command` in an acknowledgment.
    pub fn acknowledge(command: Command) -> Self {
        Self::Acknowledgment(Box::new(command))
    }

    /// Returns the wire key identifying this variant.
    pub fn key(&self) -> CommandKey {
        match self {
            Self::Connected => CommandKey::Connected,
            Self::Disconnected => CommandKey::Disconnected,
            Self::DriveForward(_) => CommandKey::DriveForward,
            Self::DriveBackward(_) => CommandKey::DriveBackward,
            Self::DriveWithPower(..) => CommandKey::DriveWithPower,
            Self::StopDriving => CommandKey::StopDriving,
            Self::TiltForward(_) => CommandKey::TiltForward,
            Self::TiltBackward(_) => CommandKey::TiltBackward,
            Self::StopTilting => CommandKey::StopTilting,
            Self::TurnLeft45 => CommandKey::TurnLeft45,
            Self::TurnLeft90 => CommandKey::TurnLeft90,
            Self::TurnLeftRear45 => CommandKey::TurnLeftRear45,
            Self::TurnRight45 => CommandKey::TurnRight45,
            Self::TurnRight90 => CommandKey::TurnRight90,
            Self::TurnRightRear45 => CommandKey::TurnRightRear45,
            Self::RequestStatus => CommandKey::RequestStatus,
            Self::Status(_) => CommandKey::Status,
            Self::Acknowledgment(_) => CommandKey::Acknowledgment,
        }
    }

    /// Returns the wire key as a string.
    pub fn key_string(&self) -> &'static str {
        self.key().as_str()
    }

    /// Returns true for acknowledgments.
    pub fn is_acknowledgment(&self) -> bool {
        matches!(self, Self::Acknowledgment(_))
    }

    /// Returns the acknowledged command, if this is an acknowledgment.
    pub fn acknowledged(&self) -> Option<&Command> {
        match self {
            Self::Acknowledgment(command) => Some(command),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::DriveForward(speed) => write!(f, "Drive Forward {} m/s", speed),
            Self::DriveBackward(speed) => write!(f, "Drive Backward {} m/s", speed),
            Self::DriveWithPower(left, right) => {
                write!(f, "Drive Power left:{} right:{}", left, right)
            }
            Self::StopDriving => write!(f, "Stop Driving"),
            Self::TiltForward(angle) => write!(f, "Tilt Forward {}°", angle),
            Self::TiltBackward(angle) => write!(f, "Tilt Backward {}°", angle),
            Self::StopTilting => write!(f, "Stop Tilting"),
            Self::TurnLeft45 => write!(f, "Turn Left 45°"),
            Self::TurnLeft90 => write!(f, "Turn Left 90°"),
            Self::TurnLeftRear45 => write!(f, "Turn Left Rear 45°"),
            Self::TurnRight45 => write!(f, "Turn Right 45°"),
            Self::TurnRight90 => write!(f, "Turn Right 90°"),
            Self::TurnRightRear45 => write!(f, "Turn Right Rear 45°"),
            Self::RequestStatus => write!(f, "Get Status"),
            Self::Status(_) => write!(f, "Status"),
            Self::Acknowledgment(command) => write!(f, "Acknowledgment {}", command),
        }
    }
}

/// The recognized wire keys, one per [`Command`] variant.
///
/// Keys are case-sensitive and stable; new keys may be added but existing
/// ones never change meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKey {
    Connected,
    Disconnected,
    DriveForward,
    DriveBackward,
    DriveWithPower,
    StopDriving,
    TiltForward,
    TiltBackward,
    StopTilting,
    TurnLeft45,
    TurnLeft90,
    TurnLeftRear45,
    TurnRight45,
    TurnRight90,
    TurnRightRear45,
    RequestStatus,
    Status,
    Acknowledgment,
}

impl CommandKey {
    /// Every key, in declaration order.
    pub const ALL: [CommandKey; 18] = [
        Self::Connected,
        Self::Disconnected,
        Self::DriveForward,
        Self::DriveBackward,
        Self::DriveWithPower,
        Self::StopDriving,
        Self::TiltForward,
        Self::TiltBackward,
        Self::StopTilting,
        Self::TurnLeft45,
        Self::TurnLeft90,
        Self::TurnLeftRear45,
        Self::TurnRight45,
        Self::TurnRight90,
        Self::TurnRightRear45,
        Self::RequestStatus,
        Self::Status,
        Self::Acknowledgment,
    ];

    /// Returns the wire spelling of this key.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::DriveForward => "driveForward",
            Self::DriveBackward => "driveBackward",
            Self::DriveWithPower => "driveWithPower",
            Self::StopDriving => "stopDriving",
            Self::TiltForward => "tiltForward",
            Self::TiltBackward => "tiltBackward",
            Self::StopTilting => "stopTilting",
            Self::TurnLeft45 => "turnLeft45",
            Self::TurnLeft90 => "turnLeft90",
            Self::TurnLeftRear45 => "turnLeftRear45",
            Self::TurnRight45 => "turnRight45",
            Self::TurnRight90 => "turnRight90",
            Self::TurnRightRear45 => "turnRightRear45",
            Self::RequestStatus => "requestStatus",
            Self::Status => "status",
            Self::Acknowledgment => "acknowledgment",
        }
    }

    /// Parses a wire key. Matching is exact and case-sensitive.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }

    /// The fixed placeholder value carried by variants without a real
    /// payload: turns encode their angle, stops and `requestStatus` encode 0.
    pub const fn canonical_value(self) -> Option<f32> {
        match self {
            Self::StopDriving | Self::StopTilting | Self::RequestStatus => Some(0.0),
            Self::TurnLeft45 => Some(-45.0),
            Self::TurnLeft90 => Some(-90.0),
            Self::TurnLeftRear45 => Some(-135.0),
            Self::TurnRight45 => Some(45.0),
            Self::TurnRight90 => Some(90.0),
            Self::TurnRightRear45 => Some(135.0),
            _ => None,
        }
    }

    /// Reconstructs the default-payload command for this key.
    ///
    /// This is lossy on purpose: acknowledgments travel as a key only, so
    /// the receiver learns which command was confirmed, not its payload.
    pub fn default_command(self) -> Command {
        match self {
            Self::Connected => Command::Connected,
            Self::Disconnected => Command::Disconnected,
            Self::DriveForward => Command::DriveForward(0.5),
            Self::DriveBackward => Command::DriveBackward(0.5),
            Self::DriveWithPower => Command::DriveWithPower(0.25, 0.25),
            Self::StopDriving => Command::StopDriving,
            Self::TiltForward => Command::TiltForward(10.0),
            Self::TiltBackward => Command::TiltBackward(10.0),
            Self::StopTilting => Command::StopTilting,
            Self::TurnLeft45 => Command::TurnLeft45,
            Self::TurnLeft90 => Command::TurnLeft90,
            Self::TurnLeftRear45 => Command::TurnLeftRear45,
            Self::TurnRight45 => Command::TurnRight45,
            Self::TurnRight90 => Command::TurnRight90,
            Self::TurnRightRear45 => Command::TurnRightRear45,
            Self::RequestStatus => Command::RequestStatus,
            Self::Status => Command::Status(StatusSnapshot::none()),
            Self::Acknowledgment => {
                Command::acknowledge(Command::Status(StatusSnapshot::none()))
            }
        }
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_parse_is_exact() {
        for key in CommandKey::ALL {
            assert_eq!(CommandKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(CommandKey::parse("DriveForward"), None);
        assert_eq!(CommandKey::parse("driveforward"), None);
        assert_eq!(CommandKey::parse(""), None);
    }

    #[test]
    fn default_command_has_matching_key() {
        for key in CommandKey::ALL {
            assert_eq!(key.default_command().key(), key);
        }
    }

    #[test]
    fn acknowledgment_default_wraps_empty_status() {
        let command = CommandKey::Acknowledgment.default_command();
        assert_eq!(
            command.acknowledged(),
            Some(&Command::Status(StatusSnapshot::none()))
        );
    }

    #[test]
    fn canonical_values_only_for_placeholder_variants() {
        assert_eq!(CommandKey::TurnLeftRear45.canonical_value(), Some(-135.0));
        assert_eq!(CommandKey::TurnRight90.canonical_value(), Some(90.0));
        assert_eq!(CommandKey::StopTilting.canonical_value(), Some(0.0));
        assert_eq!(CommandKey::DriveForward.canonical_value(), None);
        assert_eq!(CommandKey::Connected.canonical_value(), None);
    }

    #[test]
    fn descriptions() {
        assert_eq!(Command::DriveForward(0.5).to_string(), "Drive Forward 0.5 m/s");
        assert_eq!(Command::TurnLeft45.to_string(), "Turn Left 45°");
        assert_eq!(
            Command::DriveWithPower(0.25, -0.5).to_string(),
            "Drive Power left:0.25 right:-0.5"
        );
        assert_eq!(
            Command::acknowledge(Command::StopDriving).to_string(),
            "Acknowledgment Stop Driving"
        );
    }
}
