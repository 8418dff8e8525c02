//! Read-only room views: statistics and message search.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::chat::{ChatMessage, LogStatistics};
use crate::AppState;

const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/messages/search", get(search))
}

// ---------------------------------------------------------------------------
// GET /api/stats
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub participants: usize,
    pub messages: LogStatistics,
}

#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "Room",
    responses(
        (status = 200, description = "Room statistics", body = StatsResponse),
    ),
)]
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        participants: state.coordinator.participant_count(),
        messages: state.coordinator.statistics(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/messages/search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Case-insensitive term matched against message bodies and nicknames.
    pub q: Option<String>,
    /// Maximum results (1-100, default 20).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub messages: Vec<ChatMessage>,
}

/// Search retained messages, newest first.
#[utoipa::path(
    get,
    path = "/api/messages/search",
    tag = "Room",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching messages", body = SearchResponse),
    ),
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<SearchResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let term = query.q.unwrap_or_default();

    Json(SearchResponse {
        messages: state.coordinator.search(&term, limit),
    })
}
