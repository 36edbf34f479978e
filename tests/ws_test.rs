//! Integration tests for presence and relay over real WebSocket connections.

mod helpers;

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use helpers::{TestApp, recv_json, send_json, try_recv_json};

const QUIET: Duration = Duration::from_millis(200);

#[tokio::test]
async fn test_message_relayed_between_online_users() {
    let app = TestApp::spawn().await;
    let mut alice = app.connect_as("alice").await;
    let mut bob = app.connect_as("bob").await;

    send_json(
        &mut alice,
        json!({ "type": "send_msg", "to": "bob", "message": { "text": "hi bob" } }),
    )
    .await;

    let received = recv_json(&mut bob).await;
    assert_eq!(received["type"], "msg_receive");
    assert_eq!(received["from"], "alice");
    assert_eq!(received["message"], json!({ "text": "hi bob" }));

    // The sender gets no delivery signal
    assert!(try_recv_json(&mut alice, QUIET).await.is_none());
}

#[tokio::test]
async fn test_message_to_offline_user_is_dropped_silently() {
    let app = TestApp::spawn().await;
    let mut alice = app.connect_as("alice").await;

    send_json(
        &mut alice,
        json!({ "type": "send_msg", "to": "nobody", "message": "hello?" }),
    )
    .await;

    assert!(try_recv_json(&mut alice, QUIET).await.is_none());
    assert!(app.wait_for_presence("alice", true).await);
    let metrics = app.state.realtime.metrics.snapshot();
    assert_eq!(metrics.messages_dropped, 1);
}

#[tokio::test]
async fn test_disconnect_takes_user_offline() {
    let app = TestApp::spawn().await;
    let mut alice = app.connect_as("alice").await;
    let bob = app.connect_as("bob").await;
    assert!(app.is_online("bob"));

    drop(bob);
    assert!(app.wait_for_presence("bob", false).await);

    send_json(&mut alice, json!({ "type": "send_msg", "to": "bob", "message": "hi" })).await;
    assert!(try_recv_json(&mut alice, QUIET).await.is_none());
}

#[tokio::test]
async fn test_stale_close_keeps_newer_connection() {
    let app = TestApp::spawn().await;
    let mut sender = app.connect_as("sender").await;
    let mut old = app.connect_as("alice").await;
    let mut new = app.connect_as("alice").await;

    old.close(None).await.expect("close old connection");
    // Let the server process the old connection's teardown
    let deadline = tokio::time::Instant::now() + helpers::RECV_TIMEOUT;
    while app.state.realtime.connections.connection_count() > 2
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(app.state.realtime.connections.connection_count(), 2);
    assert!(app.is_online("alice"));

    send_json(&mut sender, json!({ "type": "send_msg", "to": "alice", "message": 42 })).await;
    let received = recv_json(&mut new).await;
    assert_eq!(received["message"], 42);
}

#[tokio::test]
async fn test_malformed_frame_returns_error_and_keeps_connection() {
    let app = TestApp::spawn().await;
    let mut client = app.connect().await;

    send_json(&mut client, json!({ "type": "launch_rockets" })).await;
    let reply = recv_json(&mut client).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "INVALID_MESSAGE");

    send_json(&mut client, json!({ "type": "add_user", "user_id": "carol" })).await;
    let ack = recv_json(&mut client).await;
    assert_eq!(ack["type"], "user_added");
    assert!(app.is_online("carol"));
}

#[tokio::test]
async fn test_messages_arrive_in_submission_order() {
    let app = TestApp::spawn().await;
    let mut alice = app.connect_as("alice").await;
    let mut bob = app.connect_as("bob").await;

    for n in 0..20 {
        send_json(&mut alice, json!({ "type": "send_msg", "to": "bob", "message": n })).await;
    }
    for n in 0..20 {
        let received = recv_json(&mut bob).await;
        assert_eq!(received["message"], n);
    }
}

#[tokio::test]
async fn test_engine_shutdown_closes_sockets_promptly() {
    let app = TestApp::spawn().await;
    let mut alice = app.connect_as("alice").await;

    app.state.realtime.shutdown().await;

    // Default ping interval is 30s; the socket must end well before that
    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match alice.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "socket still open after shutdown");
    assert!(!app.is_online("alice"));
}
