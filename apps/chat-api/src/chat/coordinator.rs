//! Session coordinator: connection lifecycle, message flow, and fan-out.
//!
//! Registry, message log, rate limiter, and the connection table live behind
//! one `parking_lot::Mutex`. Every operation runs as a single critical section
//! that mutates state and snapshots the recipients; delivery to sinks happens
//! after the lock is released.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chat_common::id::{prefix, prefixed_ulid};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::config::ChatConfig;
use crate::error::ChatError;

use super::events::{InboundEvent, JoinSuccess, ServerEvent};
use super::limiter::RateLimiter;
use super::log::{ChatMessage, LogStatistics, MessageLog};
use super::registry::{Participant, ParticipantRegistry};
use super::sink::{DetachedSink, Delivery, EventSink};

struct RoomState {
    registry: ParticipantRegistry,
    log: MessageLog,
    limiter: RateLimiter,
    /// Every open transport connection, joined or not.
    connections: HashMap<String, Arc<dyn EventSink>>,
}

impl RoomState {
    /// Sinks of joined participants, optionally skipping one connection.
    fn active_sinks(&self, except: Option<&str>) -> Vec<(String, Arc<dyn EventSink>)> {
        self.registry
            .connection_ids()
            .filter(|id| Some(id.as_str()) != except)
            .filter_map(|id| {
                self.connections
                    .get(id)
                    .map(|sink| (id.clone(), Arc::clone(sink)))
            })
            .collect()
    }
}

/// Deliveries computed under the lock, flushed after it is released.
#[derive(Default)]
struct Outbox {
    deliveries: Vec<(String, Arc<dyn EventSink>, Arc<ServerEvent>)>,
}

impl Outbox {
    fn unicast(&mut self, connection_id: &str, sink: &Arc<dyn EventSink>, event: ServerEvent) {
        self.deliveries
            .push((connection_id.to_string(), Arc::clone(sink), Arc::new(event)));
    }

    fn broadcast(&mut self, recipients: &[(String, Arc<dyn EventSink>)], event: ServerEvent) {
        let event = Arc::new(event);
        for (id, sink) in recipients {
            self.deliveries
                .push((id.clone(), Arc::clone(sink), Arc::clone(&event)));
        }
    }

    /// Hand every event to its sink. A sink that panics is logged and
    /// skipped; the remaining recipients still get their events.
    fn flush(self) {
        for (connection_id, sink, event) in self.deliveries {
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(Arc::clone(&event))));
            match delivered {
                Ok(Delivery::Queued) | Ok(Delivery::Detached) => {}
                Err(payload) => {
                    tracing::error!(
                        %connection_id,
                        event = event.name(),
                        detail = %panic_detail(payload.as_ref()),
                        "sink panicked during delivery"
                    );
                }
                Ok(Delivery::Dropped) => {
                    tracing::warn!(
                        %connection_id,
                        event = event.name(),
                        "outbound queue full, dropping event"
                    );
                }
                Ok(Delivery::Closed) => {
                    tracing::debug!(%connection_id, event = event.name(), "sink closed");
                }
            }
        }
    }
}

/// The single in-process authority for room state.
pub struct SessionCoordinator {
    config: ChatConfig,
    state: Mutex<RoomState>,
}

impl SessionCoordinator {
    pub fn new(config: ChatConfig) -> Self {
        let state = RoomState {
            registry: ParticipantRegistry::new(config.max_participants, config.max_nickname_length),
            log: MessageLog::new(config.max_messages, config.max_message_length),
            limiter: RateLimiter::new(config.rate_limit_messages, config.rate_limit_window),
            connections: HashMap::new(),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Register a new anonymous connection and return its identity.
    pub fn connect(&self, sink: Arc<dyn EventSink>) -> String {
        let connection_id = prefixed_ulid(prefix::CONNECTION);
        self.state
            .lock()
            .connections
            .insert(connection_id.clone(), sink);
        tracing::debug!(%connection_id, "connection opened");
        connection_id
    }

    /// Register a connection for a transport without push delivery.
    pub fn connect_detached(&self) -> String {
        self.connect(Arc::new(DetachedSink))
    }

    /// Anonymous → Active.
    pub fn join(&self, connection_id: &str, nickname: &str) -> Result<JoinSuccess, ChatError> {
        let (success, outbox) = {
            let mut state = self.state.lock();
            let sink = state
                .connections
                .get(connection_id)
                .cloned()
                .ok_or_else(|| ChatError::connection("Unknown connection"))?;

            let participant = state.registry.join(connection_id, nickname)?;
            let participants = state.registry.list_nicknames();
            let success = JoinSuccess {
                nickname: participant.nickname.clone(),
                participants: participants.clone(),
                messages: state.log.recent(self.config.join_history_limit),
            };

            let mut outbox = Outbox::default();
            outbox.unicast(connection_id, &sink, ServerEvent::JoinSuccess(success.clone()));
            outbox.broadcast(
                &state.active_sinks(Some(connection_id)),
                ServerEvent::ParticipantJoined {
                    nickname: participant.nickname.clone(),
                    timestamp: participant.joined_at,
                },
            );
            outbox.broadcast(
                &state.active_sinks(None),
                ServerEvent::ParticipantsUpdated { participants },
            );

            (success, outbox)
        };
        outbox.flush();

        tracing::info!(%connection_id, nickname = %success.nickname, "participant joined");
        Ok(success)
    }

    /// Active → Active. Stores the message and broadcasts it to everyone,
    /// sender included.
    pub fn send(&self, connection_id: &str, body: &str) -> Result<ChatMessage, ChatError> {
        let (message, outbox) = {
            let mut state = self.state.lock();
            if !state.connections.contains_key(connection_id) {
                return Err(ChatError::connection("Unknown connection"));
            }
            let nickname = state
                .registry
                .lookup(connection_id)
                .map(|p| p.nickname.clone())
                .ok_or_else(|| ChatError::connection("Join the room before sending messages"))?;

            if !state.limiter.try_acquire(connection_id, Instant::now()) {
                tracing::warn!(%connection_id, %nickname, "rate limit exceeded");
                return Err(ChatError::rate_limited());
            }

            let message = state.log.append(connection_id, &nickname, body)?;

            let mut outbox = Outbox::default();
            outbox.broadcast(
                &state.active_sinks(None),
                ServerEvent::Message(message.clone()),
            );
            (message, outbox)
        };
        outbox.flush();

        tracing::debug!(%connection_id, message_id = %message.id, "message stored");
        Ok(message)
    }

    /// Any state → Closed. Idempotent; returns the participant that left, if
    /// the connection had joined.
    pub fn disconnect(&self, connection_id: &str) -> Option<Participant> {
        let (left, outbox) = {
            let mut state = self.state.lock();
            state.connections.remove(connection_id);
            state.limiter.release(connection_id);
            let left = state.registry.leave(connection_id);

            let mut outbox = Outbox::default();
            if let Some(participant) = &left {
                let remaining = state.active_sinks(None);
                outbox.broadcast(
                    &remaining,
                    ServerEvent::ParticipantLeft {
                        nickname: participant.nickname.clone(),
                        timestamp: Utc::now(),
                    },
                );
                outbox.broadcast(
                    &remaining,
                    ServerEvent::ParticipantsUpdated {
                        participants: state.registry.list_nicknames(),
                    },
                );
            }
            (left, outbox)
        };
        outbox.flush();

        match &left {
            Some(p) => tracing::info!(%connection_id, nickname = %p.nickname, "participant left"),
            None => tracing::debug!(%connection_id, "connection closed"),
        }
        left
    }

    /// Process one inbound event. Failures, including panics raised while
    /// processing, are reported to the originating connection only.
    pub fn handle(&self, connection_id: &str, event: InboundEvent) {
        let name = event.name();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(connection_id, event)));

        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(payload) => {
                let detail = panic_detail(payload.as_ref());
                tracing::error!(%connection_id, event = name, %detail, "panic while handling event");
                ChatError::server(detail)
            }
        };

        tracing::debug!(%connection_id, event = name, code = %err.kind, "event rejected");
        self.unicast(connection_id, err.into());
    }

    fn dispatch(&self, connection_id: &str, event: InboundEvent) -> Result<(), ChatError> {
        match event {
            InboundEvent::Join { nickname } => self.join(connection_id, &nickname).map(|_| ()),
            InboundEvent::Send { body } => self.send(connection_id, &body).map(|_| ()),
            InboundEvent::Disconnect => {
                self.disconnect(connection_id);
                Ok(())
            }
        }
    }

    /// Deliver an event to a single open connection. No-op for closed ones.
    pub fn unicast(&self, connection_id: &str, event: ServerEvent) {
        let sink = self.state.lock().connections.get(connection_id).cloned();
        if let Some(sink) = sink {
            let mut outbox = Outbox::default();
            outbox.unicast(connection_id, &sink, event);
            outbox.flush();
        }
    }

    /// Tear down all room state and drop every connection sink.
    pub fn close(&self) {
        let mut state = self.state.lock();
        let connections = state.connections.len();
        state.registry.clear();
        state.log.clear();
        state.limiter.clear();
        state.connections.clear();
        tracing::info!(connections, "chat room closed");
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn participants(&self) -> Vec<String> {
        self.state.lock().registry.list_nicknames()
    }

    pub fn participant_count(&self) -> usize {
        self.state.lock().registry.count()
    }

    pub fn lookup(&self, connection_id: &str) -> Option<Participant> {
        self.state.lock().registry.lookup(connection_id).cloned()
    }

    /// Whether the connection is open (joined or not).
    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.state.lock().connections.contains_key(connection_id)
    }

    /// Whether the connection has joined and not left.
    pub fn is_active(&self, connection_id: &str) -> bool {
        self.state.lock().registry.lookup(connection_id).is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    pub fn recent(&self, limit: usize) -> Vec<ChatMessage> {
        self.state.lock().log.recent(limit)
    }

    pub fn messages_since(&self, t: DateTime<Utc>) -> Vec<ChatMessage> {
        self.state.lock().log.since(t)
    }

    pub fn search(&self, term: &str, limit: usize) -> Vec<ChatMessage> {
        self.state.lock().log.search(term, limit)
    }

    pub fn statistics(&self) -> LogStatistics {
        self.state.lock().log.statistics()
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
