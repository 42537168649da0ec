//! Group session lifecycle for exerciser participants.
//!
//! This crate provides:
//! - The transport contracts a group-session backend implements
//! - [`LifecycleManager`], which adopts, joins and tears down sessions and
//!   filters inbound envelopes through a high-water mark
//! - [`AvailabilityMonitor`], an advisory view of session eligibility
//! - An in-process loopback transport for tests and demos
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use exerciser_protocol::{Command, Service};
//! use exerciser_session::{LifecycleManager, LoopbackHub, SessionConfig, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = LoopbackHub::new();
//!     let activity = Arc::new(hub.device("controller"));
//!     let (manager, mut events) =
//!         LifecycleManager::<Service>::new(activity, SessionConfig::default());
//!
//!     manager.begin_waiting_for_sessions().await;
//!     manager.activate().await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let SessionEvent::StatusChanged { .. } = event {
//!             manager.join_session().await?;
//!             manager.send(Service::Command(Command::RequestStatus)).await?;
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod availability;
mod config;
mod error;
mod events;
pub mod loopback;
mod manager;
mod transport;

pub use availability::AvailabilityMonitor;
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult, TransportError};
pub use events::{SessionEvent, SessionMessage};
pub use loopback::{LoopbackActivity, LoopbackHub, LoopbackMessenger, LoopbackSession};
pub use manager::LifecycleManager;
pub use transport::{
    Activity, ActivityMetadata, BoxFuture, BoxStream, GroupSession, InboundMessage, Messenger,
    Participant, SessionState,
};
