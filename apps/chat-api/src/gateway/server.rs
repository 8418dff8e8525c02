//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::chat::{sink, InboundEvent, ServerEvent, SessionCoordinator};
use crate::error::ChatError;
use crate::AppState;

/// Close code sent when the server drops the connection (room closed or
/// explicit disconnect).
const CLOSE_GOING_AWAY: u16 = 1001;

/// How long the writer may keep draining queued events after the reader ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (ws_tx, ws_rx) = socket.split();
    let coordinator = Arc::clone(&state.coordinator);

    let (sink, outbound_rx) = sink::channel(state.config.outbound_buffer);
    let connection_id = coordinator.connect(sink);
    tracing::info!(%connection_id, "websocket connection opened");

    let mut writer = tokio::spawn(write_events(ws_tx, outbound_rx));
    let writer_done = read_events(&coordinator, &connection_id, ws_rx, &mut writer).await;

    // Dropping the connection's sink lets the writer drain and exit.
    coordinator.disconnect(&connection_id);
    if !writer_done && time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }

    tracing::info!(%connection_id, "websocket connection closed");
}

/// Feed inbound frames to the coordinator until the client goes away or the
/// writer stops. Returns whether the writer task has already finished.
async fn read_events(
    coordinator: &SessionCoordinator,
    connection_id: &str,
    mut ws_rx: SplitStream<WebSocket>,
    writer: &mut JoinHandle<()>,
) -> bool {
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<InboundEvent>(&text) {
                            Ok(InboundEvent::Disconnect) => return false,
                            Ok(event) => coordinator.handle(connection_id, event),
                            Err(e) => {
                                tracing::debug!(%connection_id, error = %e, "malformed inbound event");
                                coordinator.unicast(
                                    connection_id,
                                    ChatError::invalid_message("Malformed event").into(),
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(%connection_id, ?e, "ws read error");
                        return false;
                    }
                }
            }

            // The writer only stops on its own when the socket is dead or the
            // room was closed.
            _ = &mut *writer => return true,
        }
    }
}

/// Forward queued events to the socket until the sink is dropped.
async fn write_events(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Arc<ServerEvent>>,
) {
    while let Some(event) = outbound_rx.recv().await {
        let json = match serde_json::to_string(event.as_ref()) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(?err, event = event.name(), "failed to serialize event");
                continue;
            }
        };
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    let _ = send_close(&mut ws_tx, CLOSE_GOING_AWAY, "Disconnected").await;
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
