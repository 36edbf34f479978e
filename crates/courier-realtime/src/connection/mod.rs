//! WebSocket connection management - handles, lifecycle, heartbeat.

pub mod handle;
pub mod heartbeat;
pub mod manager;

pub use handle::{ConnectionHandle, PushError};
pub use manager::ConnectionManager;
