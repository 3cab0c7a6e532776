//! Chat client: scheduled account sync and polling over a `Session`.
//!
//! DESIGN
//! ======
//! `ChatClient::connect` is the explicit async initialization step: it
//! resolves the token (exchanging a pass when given one), awaits one account
//! sync, then arms two `tokio` interval tasks. Account sync rebuilds the
//! handle → channels map; polling fetches everything after the last poll
//! and emits it as one batch.
//!
//! Both timers share `ClientInner`. State sits behind a `std::sync::Mutex`
//! that is never held across an `.await`. Account sync writes only the
//! account map, polling writes only the last-poll timestamp and works from
//! the handle snapshot it took when the cycle started.
//!
//! ERROR HANDLING
//! ==============
//! Scheduled operations never return errors to the host: failures become
//! `error` events and the timer keeps running. A panicking `poll` or
//! `accountSync` handler is reported the same way. Directly invoked calls
//! (`send`, `tell`, `history`) return `Result`. Connect fails only when the
//! pass exchange or HTTP client construction fails.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, PollOrder};
use crate::events::{Event, EventDispatcher, EventKind};
use crate::session::{Session, channels_from_account_data, flatten_chats};
use crate::transport::{ChatTransport, HttpTransport};
use crate::types::{AccountChannels, ChatError, ChatWindow, Credential};

// =============================================================================
// STATE
// =============================================================================

struct SyncState {
    accounts: AccountChannels,
    /// Milliseconds since the Unix epoch. Never moves backwards.
    last_poll: i64,
}

struct ClientInner {
    session: Session,
    events: EventDispatcher,
    poll_order: PollOrder,
    state: Mutex<SyncState>,
}

impl ClientInner {
    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Fetch account data and replace the account map. The map is only
    /// swapped once the new one is fully built.
    async fn sync_accounts(&self) -> Result<AccountChannels, ChatError> {
        let data = self.session.fetch_account_data().await?;
        let accounts = channels_from_account_data(&data);
        self.lock_state().accounts = accounts.clone();
        Ok(accounts)
    }

    async fn run_account_sync(&self) {
        match self.sync_accounts().await {
            Ok(accounts) => {
                debug!(handles = accounts.len(), "account data synchronized");
                self.dispatch(&Event::AccountSync(accounts));
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "account sync failed");
                self.dispatch(&Event::Error(e));
            }
        }
    }

    async fn run_poll(&self) {
        let (handles, after) = {
            let state = self.lock_state();
            (state.accounts.keys().cloned().collect::<Vec<_>>(), state.last_poll)
        };

        let result = self
            .session
            .fetch_chats(&handles, ChatWindow::After(after))
            .await;
        self.advance_last_poll(now_millis());

        match result {
            Ok(chats) => {
                let messages = flatten_chats(&handles, chats, self.poll_order);
                debug!(count = messages.len(), "poll cycle complete");
                self.dispatch(&Event::Poll(messages));
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "chat poll failed");
                self.dispatch(&Event::Error(e));
            }
        }
    }

    /// Deliver `event`. Panicking `poll` or `accountSync` handlers are
    /// reported as an `error` event; failures inside `error` handlers are
    /// only logged, so reporting cannot recurse.
    fn dispatch(&self, event: &Event) {
        if let Err(e) = self.events.emit(event) {
            if event.kind() != EventKind::Error {
                warn!(error = %e, "event handler failed");
                // Already logged by the dispatcher.
                let _ = self.events.emit(&Event::Error(e));
            }
        }
    }

    fn advance_last_poll(&self, now: i64) {
        let mut state = self.lock_state();
        state.last_poll = state.last_poll.max(now);
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

// =============================================================================
// TIMERS
// =============================================================================

#[derive(Clone, Copy, Debug)]
enum Timer {
    AccountSync,
    Poll,
}

/// First tick lands one full `period` after arming. A slow cycle delays the
/// following tick instead of bursting to catch up.
fn spawn_timer(inner: Arc<ClientInner>, timer: Timer, period: Duration) -> JoinHandle<()> {
    info!(timer = ?timer, period = ?period, "chat timer armed");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match timer {
                Timer::AccountSync => inner.run_account_sync().await,
                Timer::Poll => inner.run_poll().await,
            }
        }
    })
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct ChatClient {
    inner: Arc<ClientInner>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl ChatClient {
    /// Connect to the API at `config.base_url`.
    ///
    /// Handlers registered on `events` beforehand observe the initial
    /// account sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the HTTP client cannot be
    /// built, or a pass cannot be exchanged for a token. A failing initial
    /// account sync is reported as an `error` event instead.
    pub async fn connect(
        credential: Credential,
        config: ClientConfig,
        events: EventDispatcher,
    ) -> Result<Self, ChatError> {
        let transport = Arc::new(HttpTransport::new(&config.base_url, config.timeouts)?);
        Self::connect_with_transport(credential, config, events, transport).await
    }

    /// Connect over an arbitrary transport.
    ///
    /// # Errors
    ///
    /// See [`ChatClient::connect`].
    pub async fn connect_with_transport(
        credential: Credential,
        config: ClientConfig,
        events: EventDispatcher,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<Self, ChatError> {
        config.validate()?;

        let token = match credential {
            Credential::Token(token) => token,
            Credential::Pass(pass) => {
                info!("exchanging chat pass for token");
                Session::exchange_credential(transport.as_ref(), &pass).await?
            }
        };

        let inner = Arc::new(ClientInner {
            session: Session::new(transport, token),
            events,
            poll_order: config.poll_order,
            state: Mutex::new(SyncState { accounts: AccountChannels::new(), last_poll: 0 }),
        });

        inner.run_account_sync().await;
        inner.advance_last_poll(now_millis());

        let timers = vec![
            spawn_timer(Arc::clone(&inner), Timer::AccountSync, config.account_sync_interval),
            spawn_timer(Arc::clone(&inner), Timer::Poll, config.poll_interval),
        ];
        info!(handles = inner.lock_state().accounts.len(), "chat client connected");

        Ok(Self { inner, timers: Mutex::new(timers) })
    }

    // -------------------------------------------------------------------------
    // subscriptions
    // -------------------------------------------------------------------------

    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler);
    }

    /// # Errors
    ///
    /// Returns [`ChatError::InvalidEventName`] for names other than `poll`,
    /// `error` and `accountSync`.
    pub fn on_named<F>(&self, name: &str, handler: F) -> Result<(), ChatError>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.events.on_named(name, handler)
    }

    pub fn subscribe_all<F>(&self, handler: F)
    where
        F: Fn(EventKind, &Event) + Send + Sync + 'static,
    {
        self.inner.events.subscribe_all(handler);
    }

    // -------------------------------------------------------------------------
    // direct operations
    // -------------------------------------------------------------------------

    /// Post `message` to `channel` as `from`.
    ///
    /// # Errors
    ///
    /// Returns the transport error for this call.
    pub async fn send(&self, from: &str, channel: &str, message: &str) -> Result<Value, ChatError> {
        self.inner
            .session
            .send_channel_message(from, channel, message)
            .await
    }

    /// Send `message` from `from` to the user `to`.
    ///
    /// # Errors
    ///
    /// Returns the transport error for this call.
    pub async fn tell(&self, from: &str, to: &str, message: &str) -> Result<Value, ChatError> {
        self.inner.session.send_tell(from, to, message).await
    }

    /// Channel history between `after` and `before` (milliseconds).
    ///
    /// Upstream returns an empty history unless `username` joined or left
    /// the channel inside the window.
    ///
    /// # Errors
    ///
    /// Returns the transport error for this call.
    pub async fn history(&self, username: &str, channel: &str, before: i64, after: i64) -> Result<Value, ChatError> {
        self.inner
            .session
            .fetch_history(username, channel, before, after)
            .await
    }

    // -------------------------------------------------------------------------
    // state
    // -------------------------------------------------------------------------

    /// Snapshot of the handle → channels map.
    #[must_use]
    pub fn accounts(&self) -> AccountChannels {
        self.inner.lock_state().accounts.clone()
    }

    /// Millisecond timestamp of the last completed poll cycle.
    #[must_use]
    pub fn last_poll(&self) -> i64 {
        self.inner.lock_state().last_poll
    }

    #[must_use]
    pub fn token(&self) -> &str {
        self.inner.session.token()
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .any(|timer| !timer.is_finished())
    }

    /// Cancel both timers. In-flight direct calls are unaffected. Safe to
    /// call more than once.
    pub fn destroy(&self) {
        let timers: Vec<_> = self
            .timers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
            .collect();
        if !timers.is_empty() {
            info!("chat client destroyed");
        }
        for timer in timers {
            timer.abort();
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
