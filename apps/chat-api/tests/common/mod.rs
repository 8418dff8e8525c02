#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

use chat_api::config::Config;
use chat_api::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build a test AppState with default limits.
pub fn test_state() -> AppState {
    test_state_with(Config::default())
}

pub fn test_state_with(config: Config) -> AppState {
    AppState::new(config)
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = chat_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background.
pub async fn start_ws_server(state: AppState) -> SocketAddr {
    let app = chat_api::routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

pub async fn connect_ws(addr: SocketAddr) -> WsClient {
    let url = format!("ws://{addr}/ws");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

pub async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

/// Read the next text frame as JSON, skipping control frames.
pub async fn next_event(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("parse event");
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("Expected text frame, got: {other:?}"),
        }
    }
}

/// Read events until one of the given type arrives.
pub async fn next_event_of(ws: &mut WsClient, ty: &str) -> serde_json::Value {
    loop {
        let event = next_event(ws).await;
        if event["type"] == ty {
            return event;
        }
    }
}

/// Connect and join, returning the socket after `join-success`.
pub async fn join_ws(addr: SocketAddr, nickname: &str) -> (WsClient, serde_json::Value) {
    let mut ws = connect_ws(addr).await;
    send_json(
        &mut ws,
        serde_json::json!({ "type": "join", "nickname": nickname }),
    )
    .await;
    let success = next_event(&mut ws).await;
    assert_eq!(success["type"], "join-success", "unexpected: {success}");
    (ws, success)
}

/// Join through the polling transport and return the connection id.
pub async fn poll_join(server: &axum_test::TestServer, nickname: &str) -> String {
    let resp = server
        .post("/api/join")
        .json(&serde_json::json!({ "nickname": nickname }))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    body["connectionId"].as_str().unwrap().to_string()
}
