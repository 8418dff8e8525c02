use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic text reported to clients for unexpected faults.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

/// Error categories surfaced to the originating connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ErrorKind {
    InvalidNickname,
    NicknameTaken,
    RoomFull,
    InvalidMessage,
    RateLimitExceeded,
    ConnectionError,
    ServerError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidNickname => "InvalidNickname",
            ErrorKind::NicknameTaken => "NicknameTaken",
            ErrorKind::RoomFull => "RoomFull",
            ErrorKind::InvalidMessage => "InvalidMessage",
            ErrorKind::RateLimitExceeded => "RateLimitExceeded",
            ErrorKind::ConnectionError => "ConnectionError",
            ErrorKind::ServerError => "ServerError",
        }
    }

    /// HTTP status used by the polling transport.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidNickname | ErrorKind::InvalidMessage => StatusCode::BAD_REQUEST,
            ErrorKind::NicknameTaken => StatusCode::CONFLICT,
            ErrorKind::RoomFull => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::ConnectionError => StatusCode::NOT_FOUND,
            ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured API error returned to HTTP clients.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: ErrorKind,
    pub message: String,
}

/// Error produced by the chat core.
///
/// Always addressed to the connection that caused it; never broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ChatError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_nickname(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidNickname, message)
    }

    pub fn nickname_taken(nickname: &str) -> Self {
        Self::new(
            ErrorKind::NicknameTaken,
            format!("Nickname \"{nickname}\" is already in use"),
        )
    }

    pub fn room_full(max: usize) -> Self {
        Self::new(
            ErrorKind::RoomFull,
            format!("The room is full ({max} participants)"),
        )
    }

    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidMessage, message)
    }

    pub fn rate_limited() -> Self {
        Self::new(
            ErrorKind::RateLimitExceeded,
            "You are sending messages too quickly",
        )
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionError, message)
    }

    /// An unexpected fault. `detail` is logged; the client only sees a
    /// generic message.
    pub fn server(detail: impl fmt::Display) -> Self {
        tracing::error!(%detail, "internal chat error");
        Self::new(ErrorKind::ServerError, INTERNAL_ERROR_MESSAGE)
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ChatError {}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.kind,
                message: self.message,
            },
        };
        (self.kind.status(), Json(body)).into_response()
    }
}
