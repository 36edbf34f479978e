//! WebSocket upgrade handler.
//!
//! This is the transport host for the real-time engine: it opens a
//! connection handle on upgrade, feeds every text frame to the connection
//! manager, drains the handle's outbound queue into the socket, and closes
//! the handle exactly once on any exit path.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use courier_realtime::connection::heartbeat::{HeartbeatConfig, run_heartbeat};
use courier_realtime::message::serializer::serialize_outbound;

use crate::state::AppState;

/// GET /ws - WebSocket upgrade
///
/// The channel itself is not authenticated here; identity comes from the
/// client's `add_user` announcement.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_ws_connection(state, socket))
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(state: AppState, socket: WebSocket) {
    let engine = state.realtime;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (handle, mut outbound_rx) = engine.connections.open();
    let conn_id = handle.id;

    info!(conn_id = %conn_id, "WebSocket connection established");

    // Outbound forwarder: the only writer to the socket
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let text = match serialize_outbound(&msg) {
                Ok(t) => t,
                Err(e) => {
                    error!(conn_id = %conn_id, error = %e, "Failed to serialize outbound message");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let heartbeat_config = HeartbeatConfig::from(engine.connections.config());
    let mut heartbeat = tokio::spawn(run_heartbeat(handle.clone(), heartbeat_config));

    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    engine.connections.handle_inbound(&handle, text.as_str()).await;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {
                    // Pings are answered by axum
                    handle.touch().await;
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(conn_id = %conn_id, bytes = data.len(), "Ignoring binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(conn_id = %conn_id, reason = ?frame, "Client initiated close");
                    break;
                }
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                None => break,
            },
            _ = handle.closed() => {
                debug!(conn_id = %conn_id, "Connection closed by server");
                break;
            }
            _ = &mut heartbeat => {
                debug!(conn_id = %conn_id, "Heartbeat ended, closing connection");
                break;
            }
            _ = &mut writer => {
                debug!(conn_id = %conn_id, "Writer ended, closing connection");
                break;
            }
        }
    }

    // Cleanup
    engine.connections.close(&handle).await;
    heartbeat.abort();
    writer.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}
