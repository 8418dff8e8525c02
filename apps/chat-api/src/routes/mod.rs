pub mod health;
pub mod poll;
pub mod stats;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest("/api", poll::router().merge(stats::router()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Polling
        poll::join,
        poll::send,
        poll::leave,
        poll::messages,
        poll::participants,
        // Room
        stats::stats,
        stats::search,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::ErrorKind,
            // Models
            crate::chat::ChatMessage,
            crate::chat::LogStatistics,
            // Route request/response types
            health::HealthResponse,
            poll::JoinRequest,
            poll::JoinResponse,
            poll::SendRequest,
            poll::LeaveRequest,
            poll::MessagesResponse,
            poll::ParticipantsResponse,
            stats::StatsResponse,
            stats::SearchResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Polling", description = "HTTP polling transport"),
        (name = "Room", description = "Room statistics and search"),
    )
)]
pub struct ApiDoc;
