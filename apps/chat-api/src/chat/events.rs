//! Inbound and outbound event types exchanged with transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ErrorKind};

use super::log::ChatMessage;

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// An event received from a client. Tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundEvent {
    Join { nickname: String },
    Send { body: String },
    Disconnect,
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::Join { .. } => "join",
            InboundEvent::Send { .. } => "send",
            InboundEvent::Disconnect => "disconnect",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Payload unicast to a connection whose join succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSuccess {
    pub nickname: String,
    pub participants: Vec<String>,
    pub messages: Vec<ChatMessage>,
}

/// An event delivered to one or all connections. Tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    JoinSuccess(JoinSuccess),
    Error {
        code: ErrorKind,
        message: String,
    },
    ParticipantJoined {
        nickname: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
    ParticipantLeft {
        nickname: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
    ParticipantsUpdated {
        participants: Vec<String>,
    },
    Message(ChatMessage),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::JoinSuccess(_) => "join-success",
            ServerEvent::Error { .. } => "error",
            ServerEvent::ParticipantJoined { .. } => "participant-joined",
            ServerEvent::ParticipantLeft { .. } => "participant-left",
            ServerEvent::ParticipantsUpdated { .. } => "participants-updated",
            ServerEvent::Message(_) => "message",
        }
    }
}

impl From<ChatError> for ServerEvent {
    fn from(err: ChatError) -> Self {
        ServerEvent::Error {
            code: err.kind,
            message: err.message,
        }
    }
}
