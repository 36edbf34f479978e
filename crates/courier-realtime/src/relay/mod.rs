//! Point-to-point message relay between online users.

pub mod dispatcher;

pub use dispatcher::{DeliveryOutcome, MessageRelay, RelayMessage};
