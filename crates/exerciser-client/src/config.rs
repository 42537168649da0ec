//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/exerciser/config.toml` by default. Every field is optional.
//!
//! ```toml
//! debug = false
//!
//! [session]
//! trace_messages = true
//!
//! [demo]
//! robot_name = "Romo"
//! script = ["driveForward", "turnLeft90", "requestStatus"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use exerciser_protocol::{Command, CommandKey};
use exerciser_session::SessionConfig;

/// Configuration for the exerciser client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Lifecycle manager settings.
    pub session: SessionSettings,

    /// Loopback demo settings.
    pub demo: DemoSettings,
}

/// Lifecycle manager settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Log every envelope sent and received.
    pub trace_messages: bool,

    /// Reject envelopes from other protocol versions.
    pub enforce_protocol_version: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            trace_messages: defaults.trace_messages,
            enforce_protocol_version: defaults.enforce_protocol_version,
        }
    }
}

impl SessionSettings {
    /// Converts to the lifecycle manager's configuration.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_trace_messages(self.trace_messages)
            .with_enforce_protocol_version(self.enforce_protocol_version)
    }
}

/// Loopback demo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Name reported by the simulated robot.
    pub robot_name: String,

    /// Name of the controlling participant.
    pub phone_name: String,

    /// How long the controller waits for each reply, in milliseconds.
    pub reply_timeout_ms: u64,

    /// Wire keys sent by the controller, in order.
    pub script: Vec<String>,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            robot_name: "Romo".to_string(),
            phone_name: "Controller".to_string(),
            reply_timeout_ms: 2000,
            script: default_script(),
        }
    }
}

fn default_script() -> Vec<String> {
    [
        CommandKey::RequestStatus,
        CommandKey::DriveForward,
        CommandKey::TurnLeft90,
        CommandKey::TiltForward,
        CommandKey::StopTilting,
        CommandKey::DriveBackward,
        CommandKey::StopDriving,
    ]
    .iter()
    .map(|key| key.as_str().to_string())
    .collect()
}

impl DemoSettings {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Resolves the script into the default command for each key.
    pub fn script_commands(&self) -> Result<Vec<Command>, String> {
        parse_script(&self.script)
    }
}

/// Resolves wire keys into their default commands.
///
/// Acknowledgments are replies, so they cannot be scripted.
pub fn parse_script<S: AsRef<str>>(keys: &[S]) -> Result<Vec<Command>, String> {
    keys.iter()
        .map(|key| {
            let key = key.as_ref();
            match CommandKey::parse(key) {
                Some(CommandKey::Acknowledgment) => {
                    Err("`acknowledgment` cannot be scripted".to_string())
                }
                Some(key) => Ok(key.default_command()),
                None => Err(format!("unknown command key `{}`", key)),
            }
        })
        .collect()
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Checks settings that parse but cannot work.
    pub fn validate(&self) -> Result<(), String> {
        if self.demo.reply_timeout_ms == 0 {
            return Err("demo.reply_timeout_ms must be greater than zero".to_string());
        }
        if self.demo.script.is_empty() {
            return Err("demo.script must not be empty".to_string());
        }
        self.demo
            .script_commands()
            .map_err(|e| format!("demo.script: {}", e))?;
        Ok(())
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("exerciser")
    }
}
