//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock, mpsc};

use courier_core::types::id::{ConnectionId, UserId};

use crate::message::types::OutboundMessage;

/// Why a push onto a connection did not reach its writer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    /// The connection has been torn down.
    #[error("connection closed")]
    Closed,
    /// The outbound buffer is full.
    #[error("send buffer full")]
    Full,
}

/// A handle to a single WebSocket connection.
///
/// Holds the sender channel for pushing messages to the client plus the
/// identity the client announced on it. Two handles are the same connection
/// iff their ids are equal.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Sender for outbound messages
    sender: mpsc::Sender<OutboundMessage>,
    /// Identity announced by the client, if any
    user_id: Mutex<Option<UserId>>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    /// Last inbound frame (including pongs)
    last_activity: RwLock<DateTime<Utc>>,
    /// Whether the connection is still alive
    alive: AtomicBool,
    /// Wakes tasks waiting in [`closed`](Self::closed)
    dead: Notify,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(sender: mpsc::Sender<OutboundMessage>) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionId::new(),
            sender,
            user_id: Mutex::new(None),
            connected_at: now,
            last_activity: RwLock::new(now),
            alive: AtomicBool::new(true),
            dead: Notify::new(),
        }
    }

    /// Create a handle together with the receiving end its writer task drains.
    pub fn with_buffer(buffer: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    /// Push a message without waiting.
    ///
    /// Messages pushed from one task arrive at the writer in push order.
    pub fn push(&self, msg: OutboundMessage) -> Result<(), PushError> {
        if !self.is_alive() {
            return Err(PushError::Closed);
        }
        match self.sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Send buffer full, dropping message");
                Err(PushError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                Err(PushError::Closed)
            }
        }
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark connection as dead
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.dead.notify_waiters();
    }

    /// Resolves once the connection has been marked dead.
    pub async fn closed(&self) {
        let notified = self.dead.notified();
        tokio::pin!(notified);
        // Register before checking so a concurrent mark_dead is not missed
        notified.as_mut().enable();
        if !self.is_alive() {
            return;
        }
        notified.await;
    }

    /// Update last activity timestamp
    pub async fn touch(&self) {
        let mut la = self.last_activity.write().await;
        *la = Utc::now();
    }

    /// Last time the client was heard from
    pub async fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.read().await
    }

    /// Identity currently announced on this connection
    pub async fn user_id(&self) -> Option<UserId> {
        self.user_id.lock().await.clone()
    }

    /// Record a new announced identity, returning the previous one
    pub(crate) async fn set_user_id(&self, user_id: UserId) -> Option<UserId> {
        self.user_id.lock().await.replace(user_id)
    }
}
