//! # courier-realtime
//!
//! Real-time presence and message relay for Courier. Provides:
//!
//! - A presence registry mapping each user to their one live connection
//! - Fire-and-forget point-to-point relay between online users
//! - Connection lifecycle handling (announce, send, close) and heartbeat
//! - Engine counters for health reporting

pub mod connection;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod relay;
pub mod server;

pub use connection::handle::{ConnectionHandle, PushError};
pub use connection::manager::ConnectionManager;
pub use presence::registry::PresenceRegistry;
pub use relay::dispatcher::{DeliveryOutcome, MessageRelay, RelayMessage};
pub use server::RealtimeEngine;
