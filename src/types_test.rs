use super::*;

// =============================================================================
// ChatError::error_code
// =============================================================================

#[test]
fn error_code_api_response() {
    let err = ChatError::Api { status: 401, body: serde_json::json!({ "ok": false }) };
    assert_eq!(err.error_code(), "E_API_RESPONSE");
    assert_eq!(err.to_string(), "API response error: status 401");
}

#[test]
fn error_code_invalid_event_name() {
    let err = ChatError::InvalidEventName("message".into());
    assert_eq!(err.error_code(), "E_INVALID_EVENT_NAME");
    assert!(err.to_string().contains("message"));
}

#[test]
fn error_code_transport_failures() {
    assert_eq!(ChatError::Request("refused".into()).error_code(), "E_API_REQUEST");
    assert_eq!(ChatError::Parse("eof".into()).error_code(), "E_API_PARSE");
    assert_eq!(ChatError::MissingField("chat_token").error_code(), "E_MISSING_FIELD");
    assert_eq!(ChatError::HttpClientBuild("tls".into()).error_code(), "E_HTTP_CLIENT_BUILD");
    assert_eq!(ChatError::Config("bad".into()).error_code(), "E_CONFIG_PARSE");
}

#[test]
fn error_code_handler_panic() {
    let err = ChatError::Handler { event: "poll", handlers: vec![0, 3] };
    assert_eq!(err.error_code(), "E_HANDLER_PANIC");
    assert_eq!(err.to_string(), "2 poll handler(s) panicked");
}

// =============================================================================
// Credential::detect
// =============================================================================

#[test]
fn five_characters_is_a_pass() {
    assert_eq!(Credential::detect("ab3de"), Credential::Pass("ab3de".into()));
}

#[test]
fn anything_else_is_a_token() {
    assert_eq!(Credential::detect("abcdefghijklmnopqrst"), Credential::Token("abcdefghijklmnopqrst".into()));
    assert_eq!(Credential::detect("abcd"), Credential::Token("abcd".into()));
}

// =============================================================================
// ChatMessage::destination
// =============================================================================

fn message(channel: Option<&str>) -> ChatMessage {
    ChatMessage {
        id: None,
        timestamp: 0,
        from_user: "trust".into(),
        to_user: "com1killer".into(),
        channel: channel.map(str::to_string),
        is_tell: channel.is_none(),
        body: "hi".into(),
        is_join: false,
        is_leave: false,
    }
}

#[test]
fn destination_prefers_channel() {
    assert_eq!(message(Some("0000")).destination(), "0000");
}

#[test]
fn destination_falls_back_to_recipient_for_tells() {
    assert_eq!(message(None).destination(), "com1killer");
}
