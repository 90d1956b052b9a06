use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::fixtures::fake_provider::FakeProvider;
use crate::fixtures::test_app::TestApp;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect_ws(app: &TestApp, token: &str) -> WsStream {
    let (ws, _) = connect_async(app.ws_url(token))
        .await
        .expect("WebSocket connect failed");
    ws
}

/// Next text frame as JSON; panics if nothing arrives in time.
async fn next_json(ws: &mut WsStream, timeout_secs: u64) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(timeout_secs), ws.next())
            .await
            .expect("timed out waiting for WS message")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("invalid JSON frame");
        }
    }
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("WS send failed");
}

#[tokio::test]
async fn ws_rejects_an_invalid_token() {
    let app = TestApp::spawn().await;
    let result = connect_async(app.ws_url("not-a-token")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn live_session_transcribes_meters_and_stops_on_exhaustion() {
    let provider = FakeProvider::new();
    let app = TestApp::spawn_with_provider(provider.clone()).await;
    let user = app
        .register_user("live@test.com", "Live", "Password123!")
        .await;
    app.set_balance(&user.access_token, 1).await;

    let mut ws = connect_ws(&app, &user.access_token).await;
    let connected = next_json(&mut ws, 3).await;
    assert_eq!(connected["type"], "connected");

    send_json(
        &mut ws,
        serde_json::json!({ "type": "session:start", "data": { "language": "en-US" } }),
    )
    .await;

    let started = next_json(&mut ws, 3).await;
    assert_eq!(started["type"], "session:started");
    assert_eq!(started["data"]["credits"], 1);
    assert_eq!(provider.open_count(), 1);

    provider
        .emit_transcript("hello metered world", true, Some(0.95))
        .await;
    let transcript = next_json(&mut ws, 3).await;
    assert_eq!(transcript["type"], "transcript");
    assert_eq!(transcript["data"]["text"], "hello metered world");
    assert_eq!(transcript["data"]["is_final"], true);

    // One quantum later the last credit is spent and the session ends.
    let update = next_json(&mut ws, 5).await;
    assert_eq!(update["type"], "balance:update");
    assert_eq!(update["data"]["credits"], 0);

    let ended = next_json(&mut ws, 3).await;
    assert_eq!(ended["type"], "session:ended");
    assert_eq!(ended["data"]["reason"], "insufficient_credits");

    assert_eq!(app.balance_of(&user.access_token).await, 0);
}

#[tokio::test]
async fn stopping_before_the_first_quantum_charges_nothing() {
    let provider = FakeProvider::new();
    let app = TestApp::spawn_with_provider(provider.clone()).await;
    let user = app
        .register_user("stopper@test.com", "Stopper", "Password123!")
        .await;

    let mut ws = connect_ws(&app, &user.access_token).await;
    next_json(&mut ws, 3).await; // connected

    send_json(&mut ws, serde_json::json!({ "type": "session:start" })).await;
    let started = next_json(&mut ws, 3).await;
    assert_eq!(started["type"], "session:started");

    send_json(&mut ws, serde_json::json!({ "type": "session:stop" })).await;
    let ended = next_json(&mut ws, 3).await;
    assert_eq!(ended["type"], "session:ended");
    assert_eq!(ended["data"]["reason"], "stopped");

    assert_eq!(app.balance_of(&user.access_token).await, 999);
}

#[tokio::test]
async fn starting_while_a_session_is_live_is_a_noop() {
    let provider = FakeProvider::new();
    let app = TestApp::spawn_with_provider(provider.clone()).await;
    let user = app
        .register_user("twice@test.com", "Twice", "Password123!")
        .await;

    let mut ws = connect_ws(&app, &user.access_token).await;
    next_json(&mut ws, 3).await; // connected

    send_json(&mut ws, serde_json::json!({ "type": "session:start" })).await;
    let started = next_json(&mut ws, 3).await;
    assert_eq!(started["type"], "session:started");

    send_json(&mut ws, serde_json::json!({ "type": "session:start" })).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(provider.open_count(), 1, "second start must not open again");

    send_json(&mut ws, serde_json::json!({ "type": "session:stop" })).await;
}

#[tokio::test]
async fn empty_balance_refuses_the_session_before_opening_the_provider() {
    let provider = FakeProvider::new();
    let app = TestApp::spawn_with_provider(provider.clone()).await;
    let user = app
        .register_user("broke@test.com", "Broke", "Password123!")
        .await;
    app.set_balance(&user.access_token, 0).await;

    let mut ws = connect_ws(&app, &user.access_token).await;
    next_json(&mut ws, 3).await; // connected

    send_json(&mut ws, serde_json::json!({ "type": "session:start" })).await;
    let ended = next_json(&mut ws, 3).await;
    assert_eq!(ended["type"], "session:ended");
    assert_eq!(ended["data"]["reason"], "insufficient_credits");
    assert_eq!(provider.open_count(), 0);
}

#[tokio::test]
async fn missing_provider_key_is_a_configuration_refusal() {
    // Default registry: no vendor API keys configured.
    let app = TestApp::spawn().await;
    let user = app
        .register_user("unconfigured@test.com", "Unconfigured", "Password123!")
        .await;

    let mut ws = connect_ws(&app, &user.access_token).await;
    next_json(&mut ws, 3).await; // connected

    send_json(&mut ws, serde_json::json!({ "type": "session:start" })).await;
    let error = next_json(&mut ws, 3).await;
    assert_eq!(error["type"], "error");
    assert!(
        error["data"]["message"]
            .as_str()
            .unwrap()
            .contains("not configured")
    );

    // No credit was touched by the refused start.
    assert_eq!(app.balance_of(&user.access_token).await, 999);
}

#[tokio::test]
async fn balance_updates_fan_out_to_the_users_other_tabs() {
    let provider = FakeProvider::new();
    let app = TestApp::spawn_with_provider(provider.clone()).await;
    let user = app
        .register_user("tabs@test.com", "Tabs", "Password123!")
        .await;

    let mut recording_tab = connect_ws(&app, &user.access_token).await;
    let mut other_tab = connect_ws(&app, &user.access_token).await;
    next_json(&mut recording_tab, 3).await; // connected
    next_json(&mut other_tab, 3).await; // connected

    send_json(
        &mut recording_tab,
        serde_json::json!({ "type": "session:start" }),
    )
    .await;
    let started = next_json(&mut recording_tab, 3).await;
    assert_eq!(started["type"], "session:started");

    // The first quantum charge reaches the tab that isn't recording.
    let update = next_json(&mut other_tab, 5).await;
    assert_eq!(update["type"], "balance:update");
    assert_eq!(update["data"]["credits"], 998);

    send_json(
        &mut recording_tab,
        serde_json::json!({ "type": "session:stop" }),
    )
    .await;
}
