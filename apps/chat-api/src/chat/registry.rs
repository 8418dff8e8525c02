//! Participant registry: who is in the room right now.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ChatError;

use super::validation::validate_nickname;

/// An active participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: String,
    pub nickname: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub joined_at: DateTime<Utc>,
    /// Arrival order. Listings sort on this, never on `joined_at`.
    #[serde(skip)]
    pub seq: u64,
}

/// Active participants keyed by connection identity.
///
/// Not synchronized on its own; the coordinator owns it behind its lock.
pub struct ParticipantRegistry {
    by_connection: HashMap<String, Participant>,
    /// Lowercased nickname → connection id.
    nicknames: HashMap<String, String>,
    next_seq: u64,
    max_participants: usize,
    max_nickname_length: usize,
}

impl ParticipantRegistry {
    pub fn new(max_participants: usize, max_nickname_length: usize) -> Self {
        Self {
            by_connection: HashMap::new(),
            nicknames: HashMap::new(),
            next_seq: 0,
            max_participants,
            max_nickname_length,
        }
    }

    /// Validate `raw_nickname` and register `connection_id` under it.
    pub fn join(&mut self, connection_id: &str, raw_nickname: &str) -> Result<Participant, ChatError> {
        let nickname = validate_nickname(raw_nickname, self.max_nickname_length)?;

        if self.by_connection.contains_key(connection_id) {
            return Err(ChatError::connection("Connection has already joined"));
        }
        if self.by_connection.len() >= self.max_participants {
            return Err(ChatError::room_full(self.max_participants));
        }

        let key = nickname.to_lowercase();
        if self.nicknames.contains_key(&key) {
            return Err(ChatError::nickname_taken(&nickname));
        }

        self.next_seq += 1;
        let participant = Participant {
            connection_id: connection_id.to_string(),
            nickname,
            joined_at: Utc::now(),
            seq: self.next_seq,
        };

        self.nicknames.insert(key, connection_id.to_string());
        self.by_connection
            .insert(connection_id.to_string(), participant.clone());

        Ok(participant)
    }

    /// Remove a participant. Returns `None` if it was not active.
    pub fn leave(&mut self, connection_id: &str) -> Option<Participant> {
        let participant = self.by_connection.remove(connection_id)?;
        self.nicknames.remove(&participant.nickname.to_lowercase());
        Some(participant)
    }

    pub fn lookup(&self, connection_id: &str) -> Option<&Participant> {
        self.by_connection.get(connection_id)
    }

    /// All active participants in join order.
    pub fn participants(&self) -> Vec<&Participant> {
        let mut all: Vec<&Participant> = self.by_connection.values().collect();
        all.sort_by_key(|p| p.seq);
        all
    }

    /// Nicknames in join order.
    pub fn list_nicknames(&self) -> Vec<String> {
        self.participants()
            .into_iter()
            .map(|p| p.nickname.clone())
            .collect()
    }

    /// Connection ids of every active participant.
    pub fn connection_ids(&self) -> impl Iterator<Item = &String> {
        self.by_connection.keys()
    }

    pub fn count(&self) -> usize {
        self.by_connection.len()
    }

    pub fn clear(&mut self) {
        self.by_connection.clear();
        self.nicknames.clear();
    }
}
