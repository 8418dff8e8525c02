//! Per-connection sliding-window rate limiter.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

pub struct RateLimiter {
    windows: HashMap<String, VecDeque<Instant>>,
    max_messages: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_messages: usize, window: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            max_messages,
            window,
        }
    }

    /// Record a send at `now` if the connection is under its limit.
    ///
    /// Returns `false` without recording when the window is already full.
    pub fn try_acquire(&mut self, connection_id: &str, now: Instant) -> bool {
        let window = self.window;
        let sends = self.windows.entry(connection_id.to_string()).or_default();

        while sends
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= window)
        {
            sends.pop_front();
        }

        if sends.len() >= self.max_messages {
            return false;
        }

        sends.push_back(now);
        true
    }

    /// Forget a connection's window entirely.
    pub fn release(&mut self, connection_id: &str) {
        self.windows.remove(connection_id);
    }

    /// Number of connections currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }
}
