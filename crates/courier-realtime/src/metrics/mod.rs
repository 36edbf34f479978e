//! Realtime engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Total connections established
    connections_total: AtomicU64,
    /// Connections currently open
    connections_active: AtomicU64,
    /// Identity announcements applied to the registry
    registrations: AtomicU64,
    /// Close events that removed a presence entry
    unregistrations: AtomicU64,
    /// Close events for connections that had already been replaced
    stale_unregisters: AtomicU64,
    /// Inbound frames processed
    messages_received: AtomicU64,
    /// Messages pushed to a recipient connection
    messages_relayed: AtomicU64,
    /// Messages dropped because the recipient was offline
    messages_dropped: AtomicU64,
    /// Messages lost because the recipient connection rejected the push
    push_failures: AtomicU64,
}

impl EngineMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection
    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a disconnection
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record an identity announcement
    pub fn registered(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an unregister; `removed` is false for a stale close
    pub fn unregistered(&self, removed: bool) {
        if removed {
            self.unregistrations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stale_unregisters.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an inbound frame
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message handed to its recipient
    pub fn message_relayed(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message dropped because the recipient was offline
    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message lost to a failed push
    pub fn push_failed(&self) {
        self.push_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            unregistrations: self.unregistrations.load(Ordering::Relaxed),
            stale_unregisters: self.stale_unregisters.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            push_failures: self.push_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total connections ever established
    pub connections_total: u64,
    /// Currently open connections
    pub connections_active: u64,
    /// Identity announcements
    pub registrations: u64,
    /// Presence entries removed on close
    pub unregistrations: u64,
    /// Close events ignored because the entry had moved on
    pub stale_unregisters: u64,
    /// Inbound frames processed
    pub messages_received: u64,
    /// Messages handed to a recipient connection
    pub messages_relayed: u64,
    /// Messages for offline recipients
    pub messages_dropped: u64,
    /// Pushes rejected by the recipient connection
    pub push_failures: u64,
}
