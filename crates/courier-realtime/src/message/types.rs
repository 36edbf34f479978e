//! Inbound and outbound WebSocket message type definitions.

use serde::{Deserialize, Serialize};
use validator::Validate;

use courier_core::types::id::{UserId, validate_user_id};

/// Messages sent by the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Announce the user this connection acts for.
    AddUser(AddUserRequest),
    /// Relay a payload to another user.
    SendMsg(SendMessageRequest),
    /// Pong response to server ping.
    Pong {
        /// Echoed timestamp.
        timestamp: i64,
    },
}

/// Identity announcement.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddUserRequest {
    /// User the connection belongs to.
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: String,
}

/// Point-to-point send request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    /// Recipient user.
    #[validate(custom(function = "validate_user_id"))]
    pub to: String,
    /// Application-defined payload, forwarded untouched.
    pub message: serde_json::Value,
}

/// Messages sent by the server to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Identity announcement accepted.
    UserAdded {
        /// Announced user.
        user_id: UserId,
    },
    /// A relayed payload from another user.
    #[serde(rename = "msg_receive")]
    MessageReceived {
        /// Sender, if the sending connection announced itself.
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<UserId>,
        /// Payload exactly as the sender supplied it.
        message: serde_json::Value,
    },
    /// Ping (server keepalive).
    Ping {
        /// Server timestamp in milliseconds.
        timestamp: i64,
    },
    /// Error message.
    Error {
        /// Error code.
        code: String,
        /// Error description.
        message: String,
    },
}
