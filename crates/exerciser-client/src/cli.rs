//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// exerciser - drive a robot from a group session
#[derive(Debug, Parser)]
#[command(name = "exerciser")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "EXERCISER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every wire key with its default command
    Keys,

    /// Print the wire form of a command
    Encode {
        /// Wire key, e.g. `driveForward`
        key: String,

        /// Payload values; the acknowledged key for `acknowledgment`
        #[arg(allow_negative_numbers = true)]
        values: Vec<String>,
    },

    /// Decode a wire map and describe the command
    Decode {
        /// JSON object with exactly one command key
        json: String,
    },

    /// Run a controller and a robot over the in-process transport
    Demo {
        /// Wire keys to send instead of the configured script (can be repeated)
        #[arg(long, action = clap::ArgAction::Append)]
        key: Vec<String>,

        /// Log every envelope sent and received
        #[arg(long)]
        trace_messages: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
