//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use courier_core::config::AppConfig;
use courier_realtime::server::RealtimeEngine;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Presence registry, relay, and connection lifecycle.
    pub realtime: RealtimeEngine,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Creates the state with a fresh real-time engine.
    pub fn new(config: AppConfig) -> Self {
        let realtime = RealtimeEngine::new(config.realtime.clone());
        Self {
            config: Arc::new(config),
            realtime,
            started_at: Instant::now(),
        }
    }
}
