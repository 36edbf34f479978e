//! Response DTOs.

use serde::{Deserialize, Serialize};

use courier_core::types::id::UserId;
use courier_realtime::metrics::MetricsSnapshot;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Basic health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Health check with real-time engine details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Open WebSocket connections, announced or not.
    pub ws_connections: usize,
    /// Users with a registered connection.
    pub online_users: usize,
    /// Engine counters.
    pub metrics: MetricsSnapshot,
}

/// Online user listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineUsersResponse {
    pub count: usize,
    pub users: Vec<UserId>,
}

/// Presence of a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceResponse {
    pub user_id: UserId,
    pub online: bool,
}
