//! Event dispatch: ordered handler lists per event kind.
//!
//! DESIGN
//! ======
//! Kinds are a closed enum, so typed subscription cannot name an unknown
//! event. `on_named` keeps string registration for hosts that wire handlers
//! from configuration; it is the only path that can fail.
//!
//! Handlers run synchronously, in registration order, on the task that
//! emits. The handler list is snapshotted before invocation so a handler
//! may subscribe further handlers without deadlocking; those run from the
//! next emission.
//!
//! ERROR HANDLING
//! ==============
//! A panicking handler is logged and skipped; the remaining handlers still
//! run. `emit` then returns `ChatError::Handler` listing the failed
//! handlers so the emitter can report it.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use tracing::error;

use crate::types::{AccountChannels, ChatError, ChatMessage};

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Poll,
    Error,
    AccountSync,
}

impl EventKind {
    pub const ALL: [Self; 3] = [Self::Poll, Self::Error, Self::AccountSync];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::Error => "error",
            Self::AccountSync => "accountSync",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ChatError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| ChatError::InvalidEventName(name.to_string()))
    }
}

/// A notification delivered to subscribers.
#[derive(Debug, Clone)]
pub enum Event {
    /// Messages received in one poll cycle. Empty when nothing arrived.
    Poll(Vec<ChatMessage>),
    /// A scheduled operation failed.
    Error(ChatError),
    /// The account map after a successful resynchronization.
    AccountSync(AccountChannels),
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Poll(_) => EventKind::Poll,
            Self::Error(_) => EventKind::Error,
            Self::AccountSync(_) => EventKind::AccountSync,
        }
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct HandlerTable {
    poll: Vec<Handler>,
    error: Vec<Handler>,
    account_sync: Vec<Handler>,
}

impl HandlerTable {
    fn list_mut(&mut self, kind: EventKind) -> &mut Vec<Handler> {
        match kind {
            EventKind::Poll => &mut self.poll,
            EventKind::Error => &mut self.error,
            EventKind::AccountSync => &mut self.account_sync,
        }
    }

    fn list(&self, kind: EventKind) -> &[Handler] {
        match kind {
            EventKind::Poll => &self.poll,
            EventKind::Error => &self.error,
            EventKind::AccountSync => &self.account_sync,
        }
    }
}

/// Shared handler registry. Cloning shares the same handlers.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Arc<RwLock<HandlerTable>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.push(kind, Arc::new(handler));
    }

    /// Register by event name (`poll`, `error` or `accountSync`).
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidEventName`] for any other name.
    pub fn on_named<F>(&self, name: &str, handler: F) -> Result<(), ChatError>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let kind = name.parse::<EventKind>()?;
        self.on(kind, handler);
        Ok(())
    }

    /// Register `handler` on every event kind. It receives the kind along
    /// with the event.
    pub fn subscribe_all<F>(&self, handler: F)
    where
        F: Fn(EventKind, &Event) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        for kind in EventKind::ALL {
            let handler = Arc::clone(&handler);
            self.push(kind, Arc::new(move |event: &Event| handler(kind, event)));
        }
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Handler`] with the registration indices of any
    /// handlers that panicked. Every handler runs regardless.
    pub fn emit(&self, event: &Event) -> Result<(), ChatError> {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .list(kind)
            .to_vec();

        let mut failed = Vec::new();
        for (index, handler) in handlers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(event = %kind, handler = index, "event handler panicked");
                failed.push(index);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ChatError::Handler { event: kind.as_str(), handlers: failed })
        }
    }

    /// Number of handlers currently registered for `kind`.
    #[cfg(test)]
    pub(crate) fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .list(kind)
            .len()
    }

    fn push(&self, kind: EventKind, handler: Handler) {
        self.handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .list_mut(kind)
            .push(handler);
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
