//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use courier_api::AppState;
use courier_core::config::AppConfig;
use courier_core::types::id::UserId;

/// A WebSocket client connected to the test server.
pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for a frame that should arrive.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Running server bound to an ephemeral local port.
pub struct TestApp {
    /// Address the server listens on
    pub addr: SocketAddr,
    /// Shared state, for inspecting the registry directly
    pub state: AppState,
    server: JoinHandle<()>,
}

impl TestApp {
    /// Start a server with default configuration
    pub async fn spawn() -> Self {
        let state = AppState::new(AppConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("local addr");

        let router = courier_api::build_router(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server");
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Open a WebSocket connection
    pub async fn connect(&self) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .expect("Failed to connect WebSocket");
        client
    }

    /// Open a connection and announce `user`, waiting for the acknowledgement
    pub async fn connect_as(&self, user: &str) -> Client {
        let mut client = self.connect().await;
        send_json(&mut client, json!({ "type": "add_user", "user_id": user })).await;
        let ack = recv_json(&mut client).await;
        assert_eq!(ack["type"], "user_added");
        assert_eq!(ack["user_id"], user);
        client
    }

    /// Whether the registry currently has `user`
    pub fn is_online(&self, user: &str) -> bool {
        self.state.realtime.presence.is_online(&UserId::from(user))
    }

    /// Poll until `user` has the expected presence or the timeout passes
    pub async fn wait_for_presence(&self, user: &str, online: bool) -> bool {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if self.is_online(user) == online {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Send a JSON text frame
pub async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Next JSON text frame, skipping server pings
pub async fn try_recv_json(client: &mut Client, wait: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let frame = tokio::time::timeout_at(deadline, client.next()).await.ok()??;
        if let Message::Text(text) = frame.expect("frame") {
            let value: Value = serde_json::from_str(text.as_str()).expect("json frame");
            if value["type"] != "ping" {
                return Some(value);
            }
        }
    }
}

/// Next JSON text frame; panics if none arrives in time
pub async fn recv_json(client: &mut Client) -> Value {
    try_recv_json(client, RECV_TIMEOUT)
        .await
        .expect("expected a frame")
}
