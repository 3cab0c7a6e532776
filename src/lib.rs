//! hackmud-chat: polling client for the hackmud chat API.
//!
//! ARCHITECTURE
//! ============
//! `transport` speaks JSON over HTTP, `session` wraps the fixed endpoints
//! with the chat token, `events` fans notifications out to subscribers and
//! `client` drives two timers (account sync and polling) on top of them.
//!
//! ```no_run
//! use hackmud_chat::{ChatClient, ClientConfig, Credential, Event, EventDispatcher, EventKind};
//!
//! # async fn run() -> Result<(), hackmud_chat::ChatError> {
//! let events = EventDispatcher::new();
//! events.on(EventKind::Poll, |event| {
//!     if let Event::Poll(messages) = event {
//!         for m in messages {
//!             println!("{} -> {}: {}", m.from_user, m.destination(), m.body);
//!         }
//!     }
//! });
//!
//! let client = ChatClient::connect(Credential::detect("ab3de"), ClientConfig::from_env()?, events).await?;
//! client.send("com", "0000", "hello").await?;
//! client.destroy();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod events;
pub mod session;
pub mod transport;
pub mod types;

pub use client::ChatClient;
pub use config::{ChatTimeouts, ClientConfig, PollOrder};
pub use events::{Event, EventDispatcher, EventKind};
pub use transport::{ChatTransport, HttpTransport};
pub use types::{AccountChannels, ChatError, ChatMessage, ChatWindow, Credential};
