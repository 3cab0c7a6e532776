//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::types::ChatError;

pub const DEFAULT_BASE_URL: &str = "https://www.hackmud.com/mobile";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_ACCOUNT_SYNC_INTERVAL_MS: u64 = 30 * 60 * 1_000;

/// How a poll cycle orders the messages it emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollOrder {
    /// Per-handle groups concatenated in account-map order. Each group is
    /// in server order; the batch as a whole is not time-sorted.
    #[default]
    PerUser,
    /// Stable sort of the whole batch by timestamp.
    Chronological,
}

/// Optional HTTP timeouts. Unset means the request waits indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChatTimeouts {
    pub request: Option<Duration>,
    pub connect: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub account_sync_interval: Duration,
    pub poll_order: PollOrder,
    pub timeouts: ChatTimeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            account_sync_interval: Duration::from_millis(DEFAULT_ACCOUNT_SYNC_INTERVAL_MS),
            poll_order: PollOrder::PerUser,
            timeouts: ChatTimeouts::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `HACKMUD_CHAT_BASE_URL`: default production endpoint
    /// - `HACKMUD_CHAT_POLL_INTERVAL_MS`: default 2000
    /// - `HACKMUD_CHAT_ACCOUNT_SYNC_INTERVAL_MS`: default 30 minutes
    /// - `HACKMUD_CHAT_POLL_ORDER`: `per_user` (default) or `chronological`
    /// - `HACKMUD_CHAT_REQUEST_TIMEOUT_SECS`: unset by default
    /// - `HACKMUD_CHAT_CONNECT_TIMEOUT_SECS`: unset by default
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] for an unknown poll order or a zero
    /// interval.
    pub fn from_env() -> Result<Self, ChatError> {
        let base_url = std::env::var("HACKMUD_CHAT_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let poll_interval =
            Duration::from_millis(env_parse_u64("HACKMUD_CHAT_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS));
        let account_sync_interval = Duration::from_millis(env_parse_u64(
            "HACKMUD_CHAT_ACCOUNT_SYNC_INTERVAL_MS",
            DEFAULT_ACCOUNT_SYNC_INTERVAL_MS,
        ));
        let poll_order = parse_poll_order(std::env::var("HACKMUD_CHAT_POLL_ORDER").ok().as_deref())?;
        let timeouts = ChatTimeouts {
            request: env_secs("HACKMUD_CHAT_REQUEST_TIMEOUT_SECS"),
            connect: env_secs("HACKMUD_CHAT_CONNECT_TIMEOUT_SECS"),
        };

        let config = Self { base_url, poll_interval, account_sync_interval, poll_order, timeouts };
        config.validate()?;
        Ok(config)
    }

    /// Reject intervals that would spin a timer.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] when either interval is zero.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.poll_interval.is_zero() {
            return Err(ChatError::Config("poll interval must be non-zero".into()));
        }
        if self.account_sync_interval.is_zero() {
            return Err(ChatError::Config("account sync interval must be non-zero".into()));
        }
        Ok(())
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn parse_poll_order(raw: Option<&str>) -> Result<PollOrder, ChatError> {
    match raw.unwrap_or("per_user") {
        "per_user" => Ok(PollOrder::PerUser),
        "chronological" => Ok(PollOrder::Chronological),
        other => Err(ChatError::Config(format!(
            "unsupported poll order '{other}' (expected 'per_user' or 'chronological')"
        ))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
