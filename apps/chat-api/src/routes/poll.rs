//! HTTP polling transport for clients without WebSocket support.
//!
//! Polling connections have no push channel: they join with `POST /api/join`,
//! receive a connection id, and read the room back with
//! `GET /api/messages?since=`. Connections that stop polling are disconnected
//! by a sweeper task owned by [`PollSessions`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::DateTime;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use utoipa::{IntoParams, ToSchema};

use crate::chat::{ChatMessage, SessionCoordinator};
use crate::error::{ApiErrorBody, ChatError};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/join", post(join))
        .route("/send", post(send))
        .route("/leave", post(leave))
        .route("/messages", get(messages))
        .route("/participants", get(participants))
}

// ---------------------------------------------------------------------------
// Idle tracking
// ---------------------------------------------------------------------------

/// Last-seen bookkeeping for polling connections.
pub struct PollSessions {
    last_seen: DashMap<String, Instant>,
    ttl: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl PollSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            last_seen: DashMap::new(),
            ttl,
            sweeper: Mutex::new(None),
        }
    }

    /// Record activity for a polling connection.
    pub fn touch(&self, connection_id: &str) {
        self.last_seen
            .insert(connection_id.to_string(), Instant::now());
    }

    /// Refresh a connection only if it is already tracked.
    pub fn refresh(&self, connection_id: &str) {
        if let Some(mut seen) = self.last_seen.get_mut(connection_id) {
            *seen = Instant::now();
        }
    }

    pub fn forget(&self, connection_id: &str) {
        self.last_seen.remove(connection_id);
    }

    pub fn is_tracked(&self, connection_id: &str) -> bool {
        self.last_seen.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    /// Stop tracking connections idle past the TTL as of `now` and return
    /// their ids.
    pub fn take_expired(&self, now: Instant) -> Vec<String> {
        let mut expired = Vec::new();
        self.last_seen.retain(|id, seen| {
            let alive = now.saturating_duration_since(*seen) < self.ttl;
            if !alive {
                expired.push(id.clone());
            }
            alive
        });
        expired
    }

    /// Disconnect every idle polling connection. Returns how many were removed.
    pub fn sweep(&self, coordinator: &SessionCoordinator) -> usize {
        let expired = self.take_expired(Instant::now());
        for connection_id in &expired {
            let left = coordinator.disconnect(connection_id);
            tracing::info!(
                %connection_id,
                nickname = left.as_ref().map(|p| p.nickname.as_str()).unwrap_or(""),
                "polling connection expired"
            );
        }
        expired.len()
    }

    /// Start the periodic sweeper. Replaces (and aborts) any running one.
    pub fn spawn_sweeper(self: &Arc<Self>, coordinator: Arc<SessionCoordinator>, every: Duration) {
        let sessions = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // First tick fires immediately; skip it.
            loop {
                ticker.tick().await;
                sessions.sweep(&coordinator);
            }
        });

        if let Some(previous) = self.sweeper.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/join
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JoinRequest {
    pub nickname: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub connection_id: String,
    pub nickname: String,
    pub participants: Vec<String>,
    pub messages: Vec<ChatMessage>,
}

/// Join the room as a polling client.
#[utoipa::path(
    post,
    path = "/api/join",
    tag = "Polling",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Joined", body = JoinResponse),
        (status = 400, description = "Invalid nickname", body = ApiErrorBody),
        (status = 409, description = "Nickname taken", body = ApiErrorBody),
        (status = 503, description = "Room full", body = ApiErrorBody),
    ),
)]
pub async fn join(
    State(state): State<AppState>,
    Json(body): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ChatError> {
    let connection_id = state.coordinator.connect_detached();

    match state.coordinator.join(&connection_id, &body.nickname) {
        Ok(success) => {
            state.polling.touch(&connection_id);
            Ok(Json(JoinResponse {
                connection_id,
                nickname: success.nickname,
                participants: success.participants,
                messages: success.messages,
            }))
        }
        Err(err) => {
            state.coordinator.disconnect(&connection_id);
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/send
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub connection_id: String,
    pub body: String,
}

#[utoipa::path(
    post,
    path = "/api/send",
    tag = "Polling",
    request_body = SendRequest,
    responses(
        (status = 201, description = "Message stored", body = ChatMessage),
        (status = 400, description = "Invalid message", body = ApiErrorBody),
        (status = 404, description = "Unknown or unjoined connection", body = ApiErrorBody),
        (status = 429, description = "Rate limit exceeded", body = ApiErrorBody),
    ),
)]
pub async fn send(
    State(state): State<AppState>,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ChatError> {
    state.polling.refresh(&body.connection_id);
    let message = state.coordinator.send(&body.connection_id, &body.body)?;
    Ok((StatusCode::CREATED, Json(message)))
}

// ---------------------------------------------------------------------------
// POST /api/leave
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub connection_id: String,
}

/// Leave the room. Idempotent.
#[utoipa::path(
    post,
    path = "/api/leave",
    tag = "Polling",
    request_body = LeaveRequest,
    responses(
        (status = 204, description = "Left the room"),
    ),
)]
pub async fn leave(State(state): State<AppState>, Json(body): Json<LeaveRequest>) -> StatusCode {
    state.polling.forget(&body.connection_id);
    state.coordinator.disconnect(&body.connection_id);
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// GET /api/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    /// Only return messages newer than this (ms since the Unix epoch).
    pub since: Option<i64>,
    /// Polling connection to keep alive.
    pub connection_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
    /// Cursor (ms since the Unix epoch) to pass as `since` on the next poll.
    pub timestamp: i64,
}

/// Messages newer than `since`, oldest first.
#[utoipa::path(
    get,
    path = "/api/messages",
    tag = "Polling",
    params(MessagesQuery),
    responses(
        (status = 200, description = "Messages, oldest first", body = MessagesResponse),
    ),
)]
pub async fn messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Json<MessagesResponse> {
    if let Some(connection_id) = &query.connection_id {
        state.polling.refresh(connection_id);
    }

    let since = query
        .since
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default();
    let messages = state.coordinator.messages_since(since);

    // Message timestamps are unique, so the newest one returned is a cursor
    // that neither repeats nor skips messages.
    let timestamp = messages
        .last()
        .map(|m| m.timestamp)
        .unwrap_or(since)
        .timestamp_millis();

    Json(MessagesResponse {
        messages,
        timestamp,
    })
}

// ---------------------------------------------------------------------------
// GET /api/participants
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ParticipantsResponse {
    pub participants: Vec<String>,
    pub count: usize,
}

#[utoipa::path(
    get,
    path = "/api/participants",
    tag = "Polling",
    responses(
        (status = 200, description = "Active participants", body = ParticipantsResponse),
    ),
)]
pub async fn participants(State(state): State<AppState>) -> Json<ParticipantsResponse> {
    let participants = state.coordinator.participants();
    Json(ParticipantsResponse {
        count: participants.len(),
        participants,
    })
}
