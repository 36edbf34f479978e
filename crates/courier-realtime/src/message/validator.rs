//! Message validation rules.

use validator::Validate;

use courier_core::{AppError, AppResult};

use super::serializer::deserialize_inbound;
use super::types::InboundMessage;

/// Validates the raw frame before parsing.
pub fn validate_frame(raw: &str, max_size: usize) -> AppResult<()> {
    if raw.len() > max_size {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {max_size} bytes"
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    Ok(())
}

/// Checks, parses, and validates one inbound text frame.
pub fn parse_inbound(raw: &str, max_size: usize) -> AppResult<InboundMessage> {
    validate_frame(raw, max_size)?;
    let msg = deserialize_inbound(raw)?;

    match &msg {
        InboundMessage::AddUser(req) => req.validate()?,
        InboundMessage::SendMsg(req) => req.validate()?,
        InboundMessage::Pong { .. } => {}
    }

    Ok(msg)
}
