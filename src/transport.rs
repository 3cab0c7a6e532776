//! Transport: JSON over HTTP to the fixed chat endpoints.
//!
//! DESIGN
//! ======
//! `ChatTransport` is the seam between the session logic and the network,
//! so the scheduler can be driven by a scripted transport in tests.
//! `HttpTransport` is the reqwest implementation. Status classification
//! lives in the pure `classify_response` for testability.
//!
//! ERROR HANDLING
//! ==============
//! One call is one network attempt. A status outside `[200, 400)` becomes
//! `ChatError::Api` carrying the parsed body (or the raw text as a JSON
//! string when the body is not JSON). Nothing is retried here.

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use crate::config::ChatTimeouts;
use crate::types::ChatError;

// =============================================================================
// TRAIT
// =============================================================================

/// Issues one request against the chat API. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// POST `body` as JSON to `path`, or GET `path` when `body` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Request`] on network failure,
    /// [`ChatError::Api`] on a non-success status and [`ChatError::Parse`]
    /// when a success response is not JSON.
    async fn request(&self, path: &str, body: Option<Value>) -> Result<Value, ChatError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::HttpClientBuild`] if the reqwest client fails to
    /// build.
    pub fn new(base_url: &str, timeouts: ChatTimeouts) -> Result<Self, ChatError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeouts.request {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = timeouts.connect {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ChatError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    #[cfg(test)]
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn request(&self, path: &str, body: Option<Value>) -> Result<Value, ChatError> {
        let url = format!("{}{path}", self.base_url);
        let request = match &body {
            Some(body) => self.http.post(&url).json(body),
            None => self.http.get(&url).header(CONTENT_TYPE, "application/json"),
        };
        debug!(path, method = if body.is_some() { "POST" } else { "GET" }, "chat API request");

        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;

        classify_response(status, &text)
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

pub(crate) fn classify_response(status: u16, text: &str) -> Result<Value, ChatError> {
    let parsed = serde_json::from_str::<Value>(text);
    if !is_success(status) {
        let body = parsed.unwrap_or_else(|_| Value::String(text.to_string()));
        return Err(ChatError::Api { status, body });
    }
    parsed.map_err(|e| ChatError::Parse(e.to_string()))
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
