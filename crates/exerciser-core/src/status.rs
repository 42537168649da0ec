//! Device status snapshot.
//!
//! A [`StatusSnapshot`] is a flat record describing the robot and the phone
//! driving it. It travels as the payload of the `status` command and carries
//! no identity beyond structural equality.

use serde::{Deserialize, Serialize};

/// Robot and phone state captured at one instant.
///
/// Field names are serialized in camelCase so the nested map inside a
/// `status` command matches the rest of the wire vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Whether a robot is attached to the phone.
    pub robot_is_connected: bool,

    /// Whether the drive motors are running.
    pub robot_is_driving: bool,
    /// Whether the head tilt motor is running.
    pub robot_is_tilting: bool,

    /// Robot can drive.
    pub robot_drivable: bool,
    /// Robot head can tilt.
    pub robot_head_tiltable: bool,
    /// Robot has an inertial measurement unit.
    pub robot_imu_equipped: bool,
    /// Robot has LEDs.
    pub robot_led_equipped: bool,

    /// Robot battery level in `0.0..=1.0`.
    pub battery_level: f32,
    /// Whether the robot battery is charging.
    pub battery_is_charging: bool,

    pub robot_name: String,
    pub robot_model_number: String,
    pub robot_firmware_version: String,
    pub robot_hardware_version: String,
    pub robot_bootloader_version: String,
    pub robot_serial_number: String,
    pub robot_manufacturer: String,

    /// Name of the phone hosting the robot.
    pub phone_name: String,
    /// Phone battery level in `0.0..=1.0`.
    pub phone_battery_level: f32,
    /// Whether the phone is charging or full.
    pub phone_is_charging: bool,
}

impl StatusSnapshot {
    /// The canonical empty snapshot: every flag false, every string empty,
    /// every level zero.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if this is the canonical empty snapshot.
    pub fn is_none(&self) -> bool {
        *self == Self::none()
    }

    /// Builder: set the robot identity name.
    pub fn with_robot_name(mut self, name: impl Into<String>) -> Self {
        self.robot_name = name.into();
        self
    }

    /// Builder: set the phone name.
    pub fn with_phone_name(mut self, name: impl Into<String>) -> Self {
        self.phone_name = name.into();
        self
    }

    /// Builder: set the robot battery state. The level is clamped to `0.0..=1.0`.
    pub fn with_battery(mut self, level: f32, charging: bool) -> Self {
        self.battery_level = level.clamp(0.0, 1.0);
        self.battery_is_charging = charging;
        self
    }

    /// Builder: set the phone battery state. The level is clamped to `0.0..=1.0`.
    pub fn with_phone_battery(mut self, level: f32, charging: bool) -> Self {
        self.phone_battery_level = level.clamp(0.0, 1.0);
        self.phone_is_charging = charging;
        self
    }

    /// Renders the snapshot as pretty-printed JSON for logs and debugging.
    pub fn debug_description(&self) -> String {
        match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => format!("Error {} encoding status.", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_all_empty() {
        let status = StatusSnapshot::none();
        assert!(!status.robot_is_connected);
        assert!(!status.robot_led_equipped);
        assert_eq!(status.battery_level, 0.0);
        assert_eq!(status.phone_battery_level, 0.0);
        assert!(status.robot_name.is_empty());
        assert!(status.phone_name.is_empty());
        assert!(status.is_none());
    }

    #[test]
    fn builders_mark_snapshot_non_empty() {
        let status = StatusSnapshot::none()
            .with_robot_name("Romo")
            .with_phone_name("Bob's phone")
            .with_battery(1.5, true)
            .with_phone_battery(-0.2, false);

        assert!(!status.is_none());
        assert_eq!(status.robot_name, "Romo");
        assert_eq!(status.phone_name, "Bob's phone");
        assert_eq!(status.battery_level, 1.0);
        assert!(status.battery_is_charging);
        assert_eq!(status.phone_battery_level, 0.0);
    }

    #[test]
    fn serializes_camel_case_fields() {
        let value = serde_json::to_value(StatusSnapshot::none()).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 19);
        assert!(object.contains_key("robotIsConnected"));
        assert!(object.contains_key("robotImuEquipped"));
        assert!(object.contains_key("robotBootloaderVersion"));
        assert!(object.contains_key("phoneIsCharging"));
    }

    #[test]
    fn debug_description_is_pretty_json() {
        let status = StatusSnapshot::none().with_robot_name("Romo");
        let description = status.debug_description();

        assert!(description.contains('\n'));
        assert!(description.contains("\"robotName\": \"Romo\""));

        let parsed: StatusSnapshot = serde_json::from_str(&description).unwrap();
        assert_eq!(parsed, status);
    }
}
