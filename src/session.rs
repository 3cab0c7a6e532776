//! Session: token-authenticated calls to the chat endpoints.
//!
//! DESIGN
//! ======
//! `Session` injects the chat token into every request and converts time
//! bounds between crate milliseconds and wire seconds. Response shaping
//! (`channels_from_account_data`, `flatten_chats`) is pure so the scheduler
//! logic can be tested without a transport.
//!
//! KNOWN API QUIRKS
//! ================
//! - Channel posts made by a tracked handle come back without `to_user`;
//!   the recipient defaults to the handle the chats were fetched for.
//! - `/chat_history.json` returns nothing when the user did not join or
//!   leave the channel inside the window. The response is passed through.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::PollOrder;
use crate::transport::ChatTransport;
use crate::types::{AccountChannels, ChatError, ChatMessage, ChatWindow};

pub const GET_TOKEN_PATH: &str = "/get_token.json";
pub const ACCOUNT_DATA_PATH: &str = "/account_data.json";
pub const CHATS_PATH: &str = "/chats.json";
pub const CREATE_CHAT_PATH: &str = "/create_chat.json";
pub const CHAT_HISTORY_PATH: &str = "/chat_history.json";

/// Per-handle wire messages as returned by `/chats.json`.
pub type ChatsByUser = BTreeMap<String, Vec<WireMessage>>;

// =============================================================================
// SESSION
// =============================================================================

pub struct Session {
    transport: Arc<dyn ChatTransport>,
    token: String,
}

impl Session {
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>, token: String) -> Self {
        Self { transport, token }
    }

    /// Exchange a short-lived chat pass for a chat token.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`ChatError::MissingField`] when the
    /// response has no `chat_token`.
    pub async fn exchange_credential(transport: &dyn ChatTransport, pass: &str) -> Result<String, ChatError> {
        let body = serde_json::json!({ "pass": pass });
        let response: TokenResponse = decode(transport.request(GET_TOKEN_PATH, Some(body)).await?)?;
        response.chat_token.ok_or(ChatError::MissingField("chat_token"))
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// # Errors
    ///
    /// Returns the transport error, or [`ChatError::Parse`] when `users` is
    /// missing or malformed.
    pub async fn fetch_account_data(&self) -> Result<AccountData, ChatError> {
        let body = serde_json::json!({ "chat_token": self.token });
        decode(self.transport.request(ACCOUNT_DATA_PATH, Some(body)).await?)
    }

    /// Fetch chats for `usernames` on one side of a time bound.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`ChatError::Parse`] when `chats` is
    /// missing or malformed.
    pub async fn fetch_chats(&self, usernames: &[String], window: ChatWindow) -> Result<ChatsByUser, ChatError> {
        let (before, after) = match window {
            ChatWindow::Before(ms) => (Some(millis_to_whole_seconds(ms)), None),
            ChatWindow::After(ms) => (None, Some(millis_to_whole_seconds(ms))),
        };
        let request = ChatsRequest { chat_token: &self.token, usernames, before, after };
        let response: ChatsResponse = decode(self.transport.request(CHATS_PATH, Some(encode(&request)?)).await?)?;
        Ok(response.chats)
    }

    /// Post `text` to `channel` as `from`.
    ///
    /// # Errors
    ///
    /// Returns the transport error unchanged.
    pub async fn send_channel_message(&self, from: &str, channel: &str, text: &str) -> Result<Value, ChatError> {
        let request =
            CreateChatRequest { chat_token: &self.token, username: from, channel: Some(channel), tell: None, msg: text };
        self.transport
            .request(CREATE_CHAT_PATH, Some(encode(&request)?))
            .await
    }

    /// Send `text` from `from` directly to `to`.
    ///
    /// # Errors
    ///
    /// Returns the transport error unchanged.
    pub async fn send_tell(&self, from: &str, to: &str, text: &str) -> Result<Value, ChatError> {
        let request =
            CreateChatRequest { chat_token: &self.token, username: from, channel: None, tell: Some(to), msg: text };
        self.transport
            .request(CREATE_CHAT_PATH, Some(encode(&request)?))
            .await
    }

    /// Raw channel history between two millisecond timestamps.
    ///
    /// Upstream returns an empty history unless `username` joined or left
    /// `channel` inside the window; that result is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns the transport error unchanged.
    pub async fn fetch_history(
        &self,
        username: &str,
        channel: &str,
        before: i64,
        after: i64,
    ) -> Result<Value, ChatError> {
        let request = HistoryRequest {
            chat_token: &self.token,
            username,
            channel,
            before: millis_to_seconds(before),
            after: millis_to_seconds(after),
        };
        self.transport
            .request(CHAT_HISTORY_PATH, Some(encode(&request)?))
            .await
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Serialize)]
struct ChatsRequest<'a> {
    chat_token: &'a str,
    usernames: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<i64>,
}

#[derive(serde::Serialize)]
struct CreateChatRequest<'a> {
    chat_token: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tell: Option<&'a str>,
    msg: &'a str,
}

#[derive(serde::Serialize)]
struct HistoryRequest<'a> {
    chat_token: &'a str,
    username: &'a str,
    channel: &'a str,
    before: f64,
    after: f64,
}

#[derive(Deserialize)]
struct TokenResponse {
    chat_token: Option<String>,
}

#[derive(Deserialize)]
struct ChatsResponse {
    chats: ChatsByUser,
}

/// `/account_data.json` payload: handle → channel → channel members.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountData {
    pub users: BTreeMap<String, serde_json::Map<String, Value>>,
}

/// A message exactly as `/chats.json` returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub id: Option<String>,
    /// Seconds since the Unix epoch, possibly fractional.
    pub t: f64,
    #[serde(default)]
    pub from_user: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub to_user: Option<String>,
    #[serde(default)]
    pub is_join: bool,
    #[serde(default)]
    pub is_leave: bool,
}

fn encode<T: serde::Serialize>(request: &T) -> Result<Value, ChatError> {
    serde_json::to_value(request).map_err(|e| ChatError::Parse(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ChatError> {
    serde_json::from_value(value).map_err(|e| ChatError::Parse(e.to_string()))
}

// =============================================================================
// TIME UNITS
// =============================================================================

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

pub(crate) fn millis_to_whole_seconds(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn millis_to_seconds(ms: i64) -> f64 {
    ms as f64 / 1000.0
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Rebuild the handle → channel names map from account data.
#[must_use]
pub fn channels_from_account_data(data: &AccountData) -> AccountChannels {
    data.users
        .iter()
        .map(|(handle, channels)| (handle.clone(), channels.keys().cloned().collect()))
        .collect()
}

/// Normalize one wire message fetched for `handle`.
#[must_use]
pub fn normalize_message(handle: &str, raw: WireMessage) -> ChatMessage {
    let to_user = raw
        .to_user
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| handle.to_string());
    ChatMessage {
        id: raw.id,
        timestamp: seconds_to_millis(raw.t),
        from_user: raw.from_user,
        to_user,
        is_tell: raw.channel.is_none(),
        channel: raw.channel,
        body: raw.msg,
        is_join: raw.is_join,
        is_leave: raw.is_leave,
    }
}

/// Flatten per-handle chats into one batch.
///
/// Groups follow `tracked` order; groups for handles the response carries
/// but `tracked` does not are appended after, in key order.
#[must_use]
pub fn flatten_chats(tracked: &[String], mut chats: ChatsByUser, order: PollOrder) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    for handle in tracked {
        if let Some(group) = chats.remove(handle) {
            messages.extend(group.into_iter().map(|raw| normalize_message(handle, raw)));
        }
    }
    for (handle, group) in chats {
        messages.extend(group.into_iter().map(|raw| normalize_message(&handle, raw)));
    }
    if order == PollOrder::Chronological {
        messages.sort_by_key(|m| m.timestamp);
    }
    messages
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
