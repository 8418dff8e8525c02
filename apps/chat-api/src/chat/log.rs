//! Bounded, time-ordered store of recent room messages.

use std::collections::{BTreeMap, VecDeque};

use chat_common::SnowflakeGenerator;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ChatError;

use super::validation::{escape_html, unescape_html, validate_message};

/// A stored room message. `body` is already HTML-escaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub connection_id: String,
    pub nickname: String,
    pub body: String,
    /// Milliseconds since the Unix epoch.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub timestamp: DateTime<Utc>,
}

/// Aggregate view over the retained messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogStatistics {
    pub count: usize,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    #[schema(value_type = Option<i64>)]
    pub oldest: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    #[schema(value_type = Option<i64>)]
    pub newest: Option<DateTime<Utc>>,
    /// Mean stored body length in characters.
    pub avg_length: f64,
    pub per_nickname_counts: BTreeMap<String, usize>,
}

pub struct MessageLog {
    messages: VecDeque<ChatMessage>,
    ids: SnowflakeGenerator,
    max_messages: usize,
    max_message_length: usize,
}

impl MessageLog {
    pub fn new(max_messages: usize, max_message_length: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(max_messages.min(1024) + 1),
            ids: SnowflakeGenerator::default(),
            max_messages,
            max_message_length,
        }
    }

    /// Validate, escape, and store a message. Evicts the oldest entries once
    /// the log is over capacity.
    pub fn append(
        &mut self,
        connection_id: &str,
        nickname: &str,
        raw_body: &str,
    ) -> Result<ChatMessage, ChatError> {
        let body = validate_message(raw_body, self.max_message_length)?;

        // Millisecond precision, strictly increasing in insertion order, so a
        // `since` cursor taken from any returned message never skips a later one.
        let mut timestamp = Utc::now().trunc_subsecs(3);
        if let Some(last) = self.messages.back() {
            timestamp = timestamp.max(last.timestamp + chrono::Duration::milliseconds(1));
        }

        let message = ChatMessage {
            id: self.ids.generate().to_string(),
            connection_id: connection_id.to_string(),
            nickname: nickname.to_string(),
            body: escape_html(&body),
            timestamp,
        };

        self.messages.push_back(message.clone());
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }

        Ok(message)
    }

    /// The last `limit` messages, oldest first. `limit` is clamped to at least 1.
    pub fn recent(&self, limit: usize) -> Vec<ChatMessage> {
        let take = limit.max(1).min(self.messages.len());
        self.messages
            .iter()
            .skip(self.messages.len() - take)
            .cloned()
            .collect()
    }

    /// Messages strictly newer than `t`, oldest first.
    pub fn since(&self, t: DateTime<Utc>) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.timestamp > t)
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over body and nickname, newest first.
    /// Bodies are matched as the sender typed them, not in escaped form.
    pub fn search(&self, term: &str, limit: usize) -> Vec<ChatMessage> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.messages
            .iter()
            .rev()
            .filter(|m| {
                unescape_html(&m.body).to_lowercase().contains(&needle)
                    || m.nickname.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn statistics(&self) -> LogStatistics {
        let mut per_nickname_counts = BTreeMap::new();
        let mut total_chars = 0usize;

        for m in &self.messages {
            *per_nickname_counts.entry(m.nickname.clone()).or_insert(0) += 1;
            total_chars += m.body.chars().count();
        }

        let count = self.messages.len();
        LogStatistics {
            count,
            oldest: self.messages.front().map(|m| m.timestamp),
            newest: self.messages.back().map(|m| m.timestamp),
            avg_length: if count == 0 {
                0.0
            } else {
                total_chars as f64 / count as f64
            },
            per_nickname_counts,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
