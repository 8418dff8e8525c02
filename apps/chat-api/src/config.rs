use std::str::FromStr;
use std::time::Duration;

/// Chat API configuration, loaded from environment variables.
///
/// Every variable is optional; missing or unparseable values use the default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Limits enforced by the chat core.
    pub chat: ChatConfig,
    /// Per-connection outbound queue capacity for push transports.
    pub outbound_buffer: usize,
    /// Polling connections idle longer than this are disconnected.
    pub poll_session_ttl: Duration,
    /// How often the polling sweeper runs.
    pub poll_sweep_interval: Duration,
}

/// Limits enforced by the session coordinator and its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub max_participants: usize,
    pub max_messages: usize,
    pub max_message_length: usize,
    pub max_nickname_length: usize,
    /// Messages allowed per connection inside one rate-limit window.
    pub rate_limit_messages: usize,
    pub rate_limit_window: Duration,
    /// Number of recent messages included in `join-success`.
    pub join_history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_participants: 50,
            max_messages: 100,
            max_message_length: 500,
            max_nickname_length: 20,
            rate_limit_messages: 3,
            rate_limit_window: Duration::from_secs(1),
            join_history_limit: 50,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4100,
            chat: ChatConfig::default(),
            outbound_buffer: 256,
            poll_session_ttl: Duration::from_secs(60),
            poll_sweep_interval: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let chat = defaults.chat;

        Self {
            port: parse_or(&lookup, "PORT", defaults.port),
            chat: ChatConfig {
                max_participants: parse_or(&lookup, "MAX_PARTICIPANTS", chat.max_participants),
                max_messages: parse_or(&lookup, "MAX_MESSAGES", chat.max_messages),
                max_message_length: parse_or(
                    &lookup,
                    "MAX_MESSAGE_LENGTH",
                    chat.max_message_length,
                ),
                max_nickname_length: parse_or(
                    &lookup,
                    "MAX_NICKNAME_LENGTH",
                    chat.max_nickname_length,
                ),
                rate_limit_messages: parse_or(
                    &lookup,
                    "RATE_LIMIT_MESSAGES",
                    chat.rate_limit_messages,
                ),
                rate_limit_window: Duration::from_millis(parse_or(
                    &lookup,
                    "RATE_LIMIT_WINDOW_MS",
                    chat.rate_limit_window.as_millis() as u64,
                )),
                join_history_limit: parse_or(
                    &lookup,
                    "JOIN_HISTORY_LIMIT",
                    chat.join_history_limit,
                ),
            },
            outbound_buffer: parse_or(&lookup, "OUTBOUND_BUFFER", defaults.outbound_buffer).max(1),
            poll_session_ttl: Duration::from_secs(parse_or(
                &lookup,
                "POLL_SESSION_TTL_SECS",
                defaults.poll_session_ttl.as_secs(),
            )),
            poll_sweep_interval: Duration::from_secs(
                parse_or(
                    &lookup,
                    "POLL_SWEEP_INTERVAL_SECS",
                    defaults.poll_sweep_interval.as_secs(),
                )
                .max(1),
            ),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(%name, %raw, "ignoring unparseable config value");
                default
            }
        },
        _ => default,
    }
}
