use super::*;
use std::sync::Mutex;

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&Event) + Send + Sync>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_for_factory = Arc::clone(&seen);
    let factory = move |label: &str| -> Box<dyn Fn(&Event) + Send + Sync> {
        let seen = Arc::clone(&seen_for_factory);
        let label = label.to_string();
        Box::new(move |event: &Event| seen.lock().unwrap().push(format!("{label}:{}", event.kind())))
    };
    (seen, factory)
}

// =============================================================================
// EventKind
// =============================================================================

#[test]
fn kind_names_round_trip() {
    for kind in EventKind::ALL {
        assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
    }
    assert_eq!(EventKind::AccountSync.to_string(), "accountSync");
}

#[test]
fn unknown_kind_name_is_rejected() {
    let err = "message".parse::<EventKind>().unwrap_err();
    assert!(matches!(err, ChatError::InvalidEventName(name) if name == "message"));
}

#[test]
fn kind_names_are_case_sensitive() {
    assert!("Poll".parse::<EventKind>().is_err());
    assert!("account_sync".parse::<EventKind>().is_err());
}

// =============================================================================
// on / on_named
// =============================================================================

#[test]
fn on_named_unknown_name_fails_and_registers_nothing() {
    let dispatcher = EventDispatcher::new();
    let err = dispatcher.on_named("chat", |_| {}).unwrap_err();
    assert!(matches!(err, ChatError::InvalidEventName(_)));
    for kind in EventKind::ALL {
        assert_eq!(dispatcher.handler_count(kind), 0);
    }
}

#[test]
fn poll_handler_sees_payload_exactly_once() {
    let dispatcher = EventDispatcher::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    dispatcher
        .on_named("poll", move |event| {
            if let Event::Poll(messages) = event {
                sink.lock().unwrap().push(messages.clone());
            }
        })
        .unwrap();

    let message = ChatMessage {
        id: Some("m1".into()),
        timestamp: 1_000_000,
        from_user: "trust".into(),
        to_user: "alice".into(),
        channel: Some("0000".into()),
        is_tell: false,
        body: "hi".into(),
        is_join: false,
        is_leave: false,
    };
    dispatcher.emit(&Event::Poll(vec![message.clone()])).unwrap();
    dispatcher.emit(&Event::Error(ChatError::Request("down".into()))).unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0], vec![message]);
}

#[test]
fn handlers_run_in_registration_order() {
    let dispatcher = EventDispatcher::new();
    let (seen, handler) = recorder();
    let first = handler("first");
    let second = handler("second");
    dispatcher.on(EventKind::Error, move |e| first(e));
    dispatcher.on(EventKind::Error, move |e| second(e));

    dispatcher.emit(&Event::Error(ChatError::Request("x".into()))).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["first:error", "second:error"]);
}

#[test]
fn emit_only_reaches_matching_kind() {
    let dispatcher = EventDispatcher::new();
    let (seen, handler) = recorder();
    let sync = handler("sync");
    dispatcher.on(EventKind::AccountSync, move |e| sync(e));

    dispatcher.emit(&Event::Poll(Vec::new())).unwrap();
    assert!(seen.lock().unwrap().is_empty());

    dispatcher.emit(&Event::AccountSync(AccountChannels::new())).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["sync:accountSync"]);
}

// =============================================================================
// subscribe_all
// =============================================================================

#[test]
fn subscribe_all_tags_every_kind() {
    let dispatcher = EventDispatcher::new();
    let tags = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&tags);
    dispatcher.subscribe_all(move |kind, event| {
        assert_eq!(kind, event.kind());
        sink.lock().unwrap().push(kind);
    });

    dispatcher.emit(&Event::Poll(Vec::new())).unwrap();
    dispatcher.emit(&Event::Error(ChatError::Parse("bad".into()))).unwrap();
    dispatcher.emit(&Event::AccountSync(AccountChannels::new())).unwrap();

    assert_eq!(*tags.lock().unwrap(), vec![EventKind::Poll, EventKind::Error, EventKind::AccountSync]);
    for kind in EventKind::ALL {
        assert_eq!(dispatcher.handler_count(kind), 1);
    }
}

// =============================================================================
// failure isolation
// =============================================================================

#[test]
fn panicking_handler_does_not_stop_later_handlers() {
    let dispatcher = EventDispatcher::new();
    let (seen, handler) = recorder();
    let after = handler("after");
    dispatcher.on(EventKind::Poll, |_| panic!("subscriber bug"));
    dispatcher.on(EventKind::Poll, move |e| after(e));

    for _ in 0..2 {
        let err = dispatcher.emit(&Event::Poll(Vec::new())).unwrap_err();
        assert!(matches!(err, ChatError::Handler { event: "poll", ref handlers } if handlers == &[0]));
    }
    assert_eq!(*seen.lock().unwrap(), vec!["after:poll", "after:poll"]);
}

#[test]
fn emit_reports_every_failed_handler() {
    let dispatcher = EventDispatcher::new();
    dispatcher.on(EventKind::AccountSync, |_| panic!("first"));
    dispatcher.on(EventKind::AccountSync, |_| {});
    dispatcher.on(EventKind::AccountSync, |_| panic!("third"));

    let err = dispatcher.emit(&Event::AccountSync(AccountChannels::new())).unwrap_err();
    assert!(matches!(&err, ChatError::Handler { event: "accountSync", handlers } if handlers == &[0, 2]));
    assert_eq!(err.to_string(), "2 accountSync handler(s) panicked");
    assert!(dispatcher.emit(&Event::Poll(Vec::new())).is_ok());
}

#[test]
fn handler_may_subscribe_during_emit() {
    let dispatcher = EventDispatcher::new();
    let inner = dispatcher.clone();
    let (seen, handler) = recorder();
    let late = Arc::new(handler("late"));
    dispatcher.on(EventKind::Poll, move |_| {
        let late = Arc::clone(&late);
        inner.on(EventKind::Poll, move |e| late(e));
    });

    dispatcher.emit(&Event::Poll(Vec::new())).unwrap();
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(dispatcher.handler_count(EventKind::Poll), 2);

    dispatcher.emit(&Event::Poll(Vec::new())).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["late:poll"]);
}

#[test]
fn clones_share_handlers() {
    let dispatcher = EventDispatcher::new();
    let clone = dispatcher.clone();
    clone.on(EventKind::Error, |_| {});
    assert_eq!(dispatcher.handler_count(EventKind::Error), 1);
}
