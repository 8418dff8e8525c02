pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use chat::SessionCoordinator;
use config::Config;
use routes::poll::PollSessions;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: Arc<SessionCoordinator>,
    pub polling: Arc<PollSessions>,
}

impl AppState {
    /// Build the process-scoped state from configuration.
    pub fn new(config: Config) -> Self {
        let coordinator = Arc::new(SessionCoordinator::new(config.chat.clone()));
        let polling = Arc::new(PollSessions::new(config.poll_session_ttl));
        Self {
            config: Arc::new(config),
            coordinator,
            polling,
        }
    }

    /// Stop background tasks and clear all room state.
    pub fn shutdown(&self) {
        self.polling.stop_sweeper();
        self.coordinator.close();
    }
}
