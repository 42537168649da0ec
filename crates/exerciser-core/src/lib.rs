//! Core types: device status snapshot, tracing setup

pub mod status;
pub mod tracing;

pub use status::StatusSnapshot;
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
