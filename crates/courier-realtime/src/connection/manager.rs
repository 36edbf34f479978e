//! Connection manager - handles connection lifecycle (open, announce, send, close).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use courier_core::config::RealtimeConfig;
use courier_core::error::AppError;
use courier_core::types::id::{ConnectionId, UserId};

use crate::message::types::{InboundMessage, OutboundMessage};
use crate::message::validator::parse_inbound;
use crate::metrics::EngineMetrics;
use crate::presence::registry::PresenceRegistry;
use crate::relay::dispatcher::{MessageRelay, RelayMessage};

use super::handle::ConnectionHandle;

/// Drives the presence registry and the relay from transport events.
///
/// The transport (the axum WebSocket handler) calls [`open`](Self::open) on
/// upgrade, [`handle_inbound`](Self::handle_inbound) for each text frame, and
/// [`close`](Self::close) exactly once when the socket goes away.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Every open connection, announced or not.
    open: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// Presence registry.
    presence: Arc<PresenceRegistry>,
    /// Message relay.
    relay: Arc<MessageRelay>,
    /// Metrics.
    metrics: Arc<EngineMetrics>,
    /// Configuration.
    config: RealtimeConfig,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new(
        config: RealtimeConfig,
        presence: Arc<PresenceRegistry>,
        relay: Arc<MessageRelay>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            open: DashMap::new(),
            presence,
            relay,
            metrics,
            config,
        }
    }

    /// Accepts a new connection.
    ///
    /// Returns the handle and the receiver the transport's writer task
    /// drains. The connection is not present until it announces a user.
    pub fn open(&self) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let (handle, rx) = ConnectionHandle::with_buffer(self.config.channel_buffer_size);
        let handle = Arc::new(handle);

        self.open.insert(handle.id, handle.clone());
        self.metrics.connection_opened();

        debug!(conn_id = %handle.id, "Connection opened");

        (handle, rx)
    }

    /// Processes one inbound text frame from a client.
    ///
    /// Malformed frames are answered with an `error` frame on the same
    /// connection; the connection stays open.
    pub async fn handle_inbound(&self, handle: &Arc<ConnectionHandle>, raw: &str) {
        handle.touch().await;
        self.metrics.message_received();

        let msg = match parse_inbound(raw, self.config.max_message_size_bytes) {
            Ok(m) => m,
            Err(e) => {
                debug!(conn_id = %handle.id, error = %e, "Rejected inbound frame");
                self.reply_error(handle, &e);
                return;
            }
        };

        match msg {
            InboundMessage::AddUser(req) => {
                self.announce(handle, UserId::from(req.user_id)).await;
            }
            InboundMessage::SendMsg(req) => {
                let message = RelayMessage {
                    to: UserId::from(req.to),
                    from: handle.user_id().await,
                    payload: req.message,
                };
                let outcome = self.relay.relay(message);
                debug!(conn_id = %handle.id, outcome = ?outcome, "Message relayed");
            }
            InboundMessage::Pong { .. } => {}
        }
    }

    /// Binds `user_id` to this connection, replacing any other connection
    /// for that user. Re-announcing a different user on the same connection
    /// releases the previous one first.
    async fn announce(&self, handle: &Arc<ConnectionHandle>, user_id: UserId) {
        if !handle.is_alive() || !self.open.contains_key(&handle.id) {
            debug!(
                conn_id = %handle.id,
                user_id = %user_id,
                "Announcement on closed connection ignored"
            );
            return;
        }

        if let Some(previous) = handle.set_user_id(user_id.clone()).await {
            if previous != user_id {
                let removed = self.presence.unregister(&previous, handle);
                self.metrics.unregistered(removed);
                debug!(
                    conn_id = %handle.id,
                    previous = %previous,
                    user_id = %user_id,
                    "Connection re-announced as another user"
                );
            }
        }

        let superseded = self.presence.register(user_id.clone(), handle.clone());

        // A close that ran between the check above and the register has
        // already read the identity; undo so the entry cannot outlive it.
        if !handle.is_alive() {
            self.presence.unregister(&user_id, handle);
            debug!(
                conn_id = %handle.id,
                user_id = %user_id,
                "Connection closed during announcement"
            );
            return;
        }

        if let Some(superseded) = superseded {
            info!(
                user_id = %user_id,
                conn_id = %handle.id,
                superseded = %superseded.id,
                "Presence moved to new connection"
            );
        } else {
            info!(user_id = %user_id, conn_id = %handle.id, "User online");
        }
        self.metrics.registered();

        if let Err(e) = handle.push(OutboundMessage::UserAdded { user_id }) {
            debug!(conn_id = %handle.id, error = %e, "Failed to acknowledge announcement");
        }
    }

    /// Tears down a connection.
    ///
    /// Uses compare-and-delete, so a close that arrives after the same user
    /// reconnected elsewhere leaves the newer mapping in place.
    pub async fn close(&self, handle: &Arc<ConnectionHandle>) {
        handle.mark_dead();

        if self.open.remove(&handle.id).is_none() {
            return;
        }
        self.metrics.connection_closed();

        if let Some(user_id) = handle.user_id().await {
            let removed = self.presence.unregister(&user_id, handle);
            self.metrics.unregistered(removed);
            if removed {
                info!(user_id = %user_id, conn_id = %handle.id, "User offline");
            } else {
                debug!(
                    user_id = %user_id,
                    conn_id = %handle.id,
                    "Stale close ignored, user has a newer connection"
                );
            }
        }

        debug!(conn_id = %handle.id, "Connection closed");
    }

    /// Closes all connections.
    ///
    /// Each handle is marked dead, which wakes its transport task through
    /// [`ConnectionHandle::closed`].
    pub async fn close_all(&self) {
        let all: Vec<Arc<ConnectionHandle>> =
            self.open.iter().map(|entry| entry.value().clone()).collect();
        for conn in &all {
            self.close(conn).await;
        }
        info!(count = all.len(), "All connections closed");
    }

    /// Returns the number of open connections.
    pub fn connection_count(&self) -> usize {
        self.open.len()
    }

    /// Returns the realtime configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    fn reply_error(&self, handle: &ConnectionHandle, err: &AppError) {
        let frame = OutboundMessage::Error {
            code: err.kind.code().to_string(),
            message: err.message.clone(),
        };
        if let Err(e) = handle.push(frame) {
            warn!(conn_id = %handle.id, error = %e, "Failed to send error frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixture {
        presence: Arc<PresenceRegistry>,
        metrics: Arc<EngineMetrics>,
        manager: ConnectionManager,
    }

    fn fixture() -> Fixture {
        let presence = Arc::new(PresenceRegistry::new());
        let metrics = Arc::new(EngineMetrics::new());
        let relay = Arc::new(MessageRelay::new(presence.clone(), metrics.clone()));
        let manager = ConnectionManager::new(
            RealtimeConfig::default(),
            presence.clone(),
            relay,
            metrics.clone(),
        );
        Fixture {
            presence,
            metrics,
            manager,
        }
    }

    fn add_user(id: &str) -> String {
        json!({ "type": "add_user", "user_id": id }).to_string()
    }

    fn send_msg(to: &str, message: serde_json::Value) -> String {
        json!({ "type": "send_msg", "to": to, "message": message }).to_string()
    }

    #[tokio::test]
    async fn test_announce_registers_and_acks() {
        let f = fixture();
        let (conn, mut rx) = f.manager.open();

        f.manager.handle_inbound(&conn, &add_user("alice")).await;

        assert_eq!(
            f.presence.lookup(&UserId::from("alice")).map(|c| c.id),
            Some(conn.id)
        );
        assert!(matches!(
            rx.try_recv(),
            Ok(OutboundMessage::UserAdded { user_id }) if user_id == UserId::from("alice")
        ));
    }

    #[tokio::test]
    async fn test_send_between_two_connections() {
        let f = fixture();
        let (alice, _alice_rx) = f.manager.open();
        let (bob, mut bob_rx) = f.manager.open();
        f.manager.handle_inbound(&alice, &add_user("alice")).await;
        f.manager.handle_inbound(&bob, &add_user("bob")).await;
        let _ = bob_rx.try_recv();

        f.manager
            .handle_inbound(&alice, &send_msg("bob", json!({ "text": "hi" })))
            .await;

        match bob_rx.try_recv() {
            Ok(OutboundMessage::MessageReceived { from, message }) => {
                assert_eq!(from, Some(UserId::from("alice")));
                assert_eq!(message, json!({ "text": "hi" }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_to_offline_user_gives_sender_no_signal() {
        let f = fixture();
        let (alice, mut alice_rx) = f.manager.open();
        f.manager.handle_inbound(&alice, &add_user("alice")).await;
        let _ = alice_rx.try_recv();

        f.manager
            .handle_inbound(&alice, &send_msg("ghost", json!("hi")))
            .await;

        assert!(alice_rx.try_recv().is_err());
        assert_eq!(f.metrics.snapshot().messages_dropped, 1);
    }

    #[tokio::test]
    async fn test_close_after_replace_keeps_new_connection() {
        let f = fixture();
        let (conn_a, _rx_a) = f.manager.open();
        let (conn_b, _rx_b) = f.manager.open();
        f.manager.handle_inbound(&conn_a, &add_user("alice")).await;
        f.manager.handle_inbound(&conn_b, &add_user("alice")).await;

        f.manager.close(&conn_a).await;

        assert_eq!(
            f.presence.lookup(&UserId::from("alice")).map(|c| c.id),
            Some(conn_b.id)
        );
        assert_eq!(f.metrics.snapshot().stale_unregisters, 1);
        assert_eq!(f.manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_close_removes_presence() {
        let f = fixture();
        let (conn, _rx) = f.manager.open();
        f.manager.handle_inbound(&conn, &add_user("bob")).await;

        f.manager.close(&conn).await;
        f.manager.close(&conn).await;

        assert!(!f.presence.is_online(&UserId::from("bob")));
        assert_eq!(f.metrics.snapshot().connections_active, 0);
        assert_eq!(f.metrics.snapshot().unregistrations, 1);
    }

    #[tokio::test]
    async fn test_reannounce_as_other_user_releases_previous() {
        let f = fixture();
        let (conn, _rx) = f.manager.open();
        f.manager.handle_inbound(&conn, &add_user("first")).await;
        f.manager.handle_inbound(&conn, &add_user("second")).await;

        assert!(!f.presence.is_online(&UserId::from("first")));
        assert!(f.presence.is_online(&UserId::from("second")));
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_reply() {
        let f = fixture();
        let (conn, mut rx) = f.manager.open();

        f.manager.handle_inbound(&conn, "not json").await;

        match rx.try_recv() {
            Ok(OutboundMessage::Error { code, .. }) => assert_eq!(code, "INVALID_MESSAGE"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(conn.is_alive());
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let f = fixture();
        for name in ["a", "b", "c"] {
            let (conn, _rx) = f.manager.open();
            f.manager.handle_inbound(&conn, &add_user(name)).await;
        }

        f.manager.close_all().await;

        assert_eq!(f.presence.online_count(), 0);
        assert_eq!(f.manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_announce_after_shutdown_does_not_leak_presence() {
        let f = fixture();
        let (conn, mut rx) = f.manager.open();

        f.manager.close_all().await;
        f.manager.handle_inbound(&conn, &add_user("zed")).await;
        f.manager.close(&conn).await;

        assert!(!f.presence.is_online(&UserId::from("zed")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_all_wakes_transport() {
        let f = fixture();
        let (conn, _rx) = f.manager.open();

        f.manager.close_all().await;

        tokio::time::timeout(std::time::Duration::from_secs(1), conn.closed())
            .await
            .expect("closed resolves after close_all");
    }
}
