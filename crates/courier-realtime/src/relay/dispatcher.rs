//! Message relay - looks up the recipient and pushes, or drops.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use courier_core::types::id::UserId;

use crate::message::types::OutboundMessage;
use crate::metrics::EngineMetrics;
use crate::presence::registry::PresenceRegistry;

/// A message in flight between receipt and delivery. Never stored.
#[derive(Debug, Clone)]
pub struct RelayMessage {
    /// Recipient
    pub to: UserId,
    /// Sender, when the sending connection has announced itself
    pub from: Option<UserId>,
    /// Opaque application payload
    pub payload: serde_json::Value,
}

/// What happened to a relayed message.
///
/// Informational only: none of these is reported back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Handed to the recipient's connection.
    Delivered,
    /// No connection registered for the recipient; dropped.
    RecipientOffline,
    /// The recipient's connection rejected the push; dropped.
    PushFailed,
}

/// Forwards messages to the recipient's current connection.
///
/// There is no queue and no retry: a recipient that is not present at the
/// moment of the lookup simply does not receive the message.
#[derive(Debug)]
pub struct MessageRelay {
    presence: Arc<PresenceRegistry>,
    metrics: Arc<EngineMetrics>,
}

impl MessageRelay {
    /// Creates a relay over the given registry.
    pub fn new(presence: Arc<PresenceRegistry>, metrics: Arc<EngineMetrics>) -> Self {
        Self { presence, metrics }
    }

    /// Delivers `message` if its recipient is online right now.
    ///
    /// The handle is looked up fresh on every call and pushed to without
    /// holding any registry lock.
    pub fn relay(&self, message: RelayMessage) -> DeliveryOutcome {
        let Some(handle) = self.presence.lookup(&message.to) else {
            debug!(to = %message.to, "Recipient offline, message dropped");
            self.metrics.message_dropped();
            return DeliveryOutcome::RecipientOffline;
        };

        let outbound = OutboundMessage::MessageReceived {
            from: message.from,
            message: message.payload,
        };

        match handle.push(outbound) {
            Ok(()) => {
                self.metrics.message_relayed();
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                debug!(
                    to = %message.to,
                    conn_id = %handle.id,
                    error = %e,
                    "Push to recipient failed, message dropped"
                );
                self.metrics.push_failed();
                DeliveryOutcome::PushFailed
            }
        }
    }
}
