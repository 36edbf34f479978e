//! Ping/pong heartbeat for WebSocket keepalive.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use courier_core::config::RealtimeConfig;

use super::handle::ConnectionHandle;
use crate::message::types::OutboundMessage;

/// Heartbeat configuration
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between pings
    pub ping_interval: Duration,
    /// Grace period after a ping before the connection is considered dead
    pub ping_timeout: Duration,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            ping_timeout: config.ping_timeout(),
        }
    }
}

/// Run heartbeat loop for a connection.
///
/// Sends periodic pings and watches inbound activity. Returns once the
/// connection is dead, either because it was closed elsewhere or because the
/// client went silent for longer than one interval plus the timeout. The
/// caller then tears the socket down, which runs the normal close path.
pub async fn run_heartbeat(handle: Arc<ConnectionHandle>, config: HeartbeatConfig) {
    let mut interval = time::interval(config.ping_interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    let allowed_silence = config.ping_interval + config.ping_timeout;

    loop {
        interval.tick().await;

        if !handle.is_alive() {
            break;
        }

        let last_seen = handle.last_activity().await;
        if let Ok(silence) = (Utc::now() - last_seen).to_std() {
            if silence > allowed_silence {
                tracing::warn!(
                    conn_id = %handle.id,
                    silence_ms = silence.as_millis() as u64,
                    "Heartbeat timeout"
                );
                handle.mark_dead();
                break;
            }
        }

        let ping = OutboundMessage::Ping {
            timestamp: Utc::now().timestamp_millis(),
        };

        if handle.push(ping).is_err() && !handle.is_alive() {
            tracing::debug!(conn_id = %handle.id, "Ping send failed, connection closed");
            break;
        }
    }

    tracing::debug!(conn_id = %handle.id, "Heartbeat loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HeartbeatConfig {
        HeartbeatConfig {
            ping_interval: Duration::from_millis(20),
            ping_timeout: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_sends_pings() {
        let (handle, mut rx) = ConnectionHandle::with_buffer(8);
        let handle = Arc::new(handle);
        let task = tokio::spawn(run_heartbeat(handle.clone(), config()));

        let first = time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("ping within timeout");
        assert!(matches!(first, Some(OutboundMessage::Ping { .. })));

        handle.mark_dead();
        time::timeout(Duration::from_secs(2), task)
            .await
            .expect("loop exits")
            .expect("task ok");
    }

    #[tokio::test]
    async fn test_silent_client_is_marked_dead() {
        let (handle, _rx) = ConnectionHandle::with_buffer(64);
        let handle = Arc::new(handle);

        time::timeout(Duration::from_secs(2), run_heartbeat(handle.clone(), config()))
            .await
            .expect("heartbeat gives up on a silent client");
        assert!(!handle.is_alive());
    }
}
