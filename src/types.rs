//! Chat types: messages, account map and errors shared by every layer.
//!
//! Timestamps are milliseconds since the Unix epoch throughout the crate.
//! The API speaks seconds; conversion happens only in `session`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Handle → channel names the handle currently belongs to.
pub type AccountChannels = BTreeMap<String, Vec<String>>;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by chat client operations.
///
/// `Clone` so a failure can be delivered to every `error` event handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChatError {
    /// The API answered with a status outside `[200, 400)`.
    #[error("API response error: status {status}")]
    Api { status: u16, body: serde_json::Value },

    /// Name-based subscription used a name that is not an event kind.
    #[error("invalid event name: {0}")]
    InvalidEventName(String),

    /// The HTTP request itself failed (connect, TLS, timeout, body read).
    #[error("API request failed: {0}")]
    Request(String),

    /// A response body could not be deserialized into the expected shape.
    #[error("API response parse failed: {0}")]
    Parse(String),

    /// A response was well-formed JSON but lacked a required field.
    #[error("API response missing field `{0}`")]
    MissingField(&'static str),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Config(String),

    /// One or more subscribers panicked while handling an event.
    #[error("{} {event} handler(s) panicked", handlers.len())]
    Handler { event: &'static str, handlers: Vec<usize> },
}

impl ChatError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Api { .. } => "E_API_RESPONSE",
            Self::InvalidEventName(_) => "E_INVALID_EVENT_NAME",
            Self::Request(_) => "E_API_REQUEST",
            Self::Parse(_) => "E_API_PARSE",
            Self::MissingField(_) => "E_MISSING_FIELD",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Config(_) => "E_CONFIG_PARSE",
            Self::Handler { .. } => "E_HANDLER_PANIC",
        }
    }
}

// =============================================================================
// CREDENTIAL
// =============================================================================

/// How the client authenticates at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// A long-lived chat token, used as-is.
    Token(String),
    /// A short-lived chat pass (`chat_pass` in game), exchanged for a token.
    Pass(String),
}

impl Credential {
    /// Chat passes are always five characters; anything else is a token.
    #[must_use]
    pub fn detect(raw: &str) -> Self {
        if raw.chars().count() == 5 {
            Self::Pass(raw.to_string())
        } else {
            Self::Token(raw.to_string())
        }
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// A normalized chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned message id, when the API sends one.
    pub id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub from_user: String,
    /// Recipient handle. For channel messages this is the tracked handle
    /// the message was fetched for.
    pub to_user: String,
    /// Channel name; `None` for tells.
    pub channel: Option<String>,
    pub is_tell: bool,
    pub body: String,
    pub is_join: bool,
    pub is_leave: bool,
}

impl ChatMessage {
    /// Channel for channel messages, recipient handle for tells.
    #[must_use]
    pub fn destination(&self) -> &str {
        self.channel.as_deref().unwrap_or(&self.to_user)
    }
}

/// Time bound for a chats lookup. The API requires exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatWindow {
    /// Messages strictly before this millisecond timestamp.
    Before(i64),
    /// Messages strictly after this millisecond timestamp.
    After(i64),
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
