//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tracing::info;

use courier_core::config::RealtimeConfig;

use crate::connection::manager::ConnectionManager;
use crate::metrics::EngineMetrics;
use crate::presence::registry::PresenceRegistry;
use crate::relay::dispatcher::MessageRelay;

/// Central real-time engine that owns the registry, relay, and lifecycle host.
///
/// Construct one per process and share it; nothing here is global.
#[derive(Debug, Clone)]
pub struct RealtimeEngine {
    /// Connection lifecycle host.
    pub connections: Arc<ConnectionManager>,
    /// Presence registry.
    pub presence: Arc<PresenceRegistry>,
    /// Message relay.
    pub relay: Arc<MessageRelay>,
    /// Metrics collector.
    pub metrics: Arc<EngineMetrics>,
}

impl RealtimeEngine {
    /// Creates a new real-time engine with all subsystems.
    pub fn new(config: RealtimeConfig) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let presence = Arc::new(PresenceRegistry::new());
        let relay = Arc::new(MessageRelay::new(presence.clone(), metrics.clone()));
        let connections = Arc::new(ConnectionManager::new(
            config,
            presence.clone(),
            relay.clone(),
            metrics.clone(),
        ));

        info!("Real-time engine initialized");

        Self {
            connections,
            presence,
            relay,
            metrics,
        }
    }

    /// Closes every connection. Presence is in-memory only and is lost.
    pub async fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.connections.close_all().await;
        info!("Real-time engine shut down");
    }
}
