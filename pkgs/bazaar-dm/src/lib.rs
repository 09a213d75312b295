//! Bazaar DM - direct messaging client
//!
//! One-to-one conversations between marketplace users, built on the
//! [`RemoteStore`] contract from `bazaar-store`.
//!
//! # Features
//!
//! - **Conversation list**: the viewer's conversations joined with the other
//!   participant's profile, the last message and an unread count
//! - **Lazy creation**: a conversation is created on first contact and
//!   reused afterwards
//! - **Live views**: an open conversation receives inserts through a store
//!   subscription and re-fetches on a fixed interval as a fallback
//! - **Optimistic sends**: a pending entry is shown immediately and either
//!   replaced by the stored message or rolled back with the draft as typed
//! - **Read markers**: opening a conversation or receiving a message in it
//!   moves the viewer's read marker
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use bazaar_dm::{MessagingClient, MessagingConfig, ViewEvent};
//! use bazaar_store::MemoryStore;
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), bazaar_dm::MessagingError> {
//! let store = MemoryStore::new();
//! store.sign_in("alice");
//!
//! let client = MessagingClient::new(Arc::new(store), MessagingConfig::default());
//! let conversation_id = client.get_or_create_direct_conversation("bob").await?;
//!
//! let (mut view, mut events) = client.open_conversation(&conversation_id).await?;
//! view.send_message("Is the bike still available?").await?;
//!
//! while let Some(event) = events.next().await {
//!     if let ViewEvent::MessagesUpdated { messages, .. } = event {
//!         println!("{} messages", messages.len());
//!         break;
//!     }
//! }
//! view.close().await;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod conversations;
pub mod error;
pub mod join;
pub mod messages;
pub mod models;
pub mod read_state;
pub mod view;

pub use channel::{Merge, MessageList};
pub use client::MessagingClient;
pub use config::{MessagingConfig, PollMerge};
pub use conversations::ConversationRepository;
pub use error::{MessagingError, Result};
pub use models::{
    Conversation, ConversationRecord, Message, MessageRecord, PendingMessage, ReadStatusRecord,
    UserProfile,
};
pub use read_state::ReadTracker;
pub use view::{ConversationView, UpdateSource, ViewEvent, ViewPhase};

use bazaar_store::{from_row, RemoteStore, Row};
use serde::de::DeserializeOwned;

/// The signed-in user, or [`MessagingError::AuthRequired`]
pub(crate) async fn require_viewer(store: &dyn RemoteStore) -> Result<String> {
    store
        .current_user()
        .await
        .ok_or(MessagingError::AuthRequired)
}

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| from_row(row).map_err(MessagingError::from))
        .collect()
}
