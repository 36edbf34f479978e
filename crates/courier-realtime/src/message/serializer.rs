//! JSON serialization for WebSocket messages.

use courier_core::AppResult;

use super::types::{InboundMessage, OutboundMessage};

/// Serialize an outbound message to a JSON text frame
pub fn serialize_outbound(msg: &OutboundMessage) -> AppResult<String> {
    Ok(serde_json::to_string(msg)?)
}

/// Deserialize an inbound message from JSON
pub fn deserialize_inbound(text: &str) -> AppResult<InboundMessage> {
    Ok(serde_json::from_str(text)?)
}
