//! Bazaar Store - remote data store contract for direct messaging
//!
//! The messaging client never talks to a database directly. Everything it
//! reads or writes goes through the [`RemoteStore`] trait, which mirrors the
//! small surface of a hosted backend-as-a-service: filtered queries, single
//! row inserts, keyed upserts, deletes, insert notifications and the
//! identity of the signed-in user.
//!
//! # Backends
//!
//! - **MemoryStore**: in-process backend. Every [`MemoryStore::client`]
//!   handle shares the same tables but carries its own session, which makes
//!   multi-user scenarios easy to drive from tests.
//! - **SqliteStore**: Sea-ORM/SQLite backend with migrations for the four
//!   messaging tables.
//!
//! Both backends deliver insert notifications through a shared
//! [`RealtimeHub`].
//!
//! # Tables
//!
//! - `direct_conversations`: one row per 1:1 thread
//! - `private_messages`: message bodies, ordered by `created_at`
//! - `message_read_status`: per user, per conversation read marker
//! - `profiles`: user lookup data (read-only for the messaging core)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use bazaar_store::{Filter, MemoryStore, Order, RemoteStore, Table};
//!
//! # async fn example() -> Result<(), bazaar_store::StoreError> {
//! let store = MemoryStore::new();
//! store.sign_in("alice");
//!
//! let rows = store
//!     .query(
//!         Table::PrivateMessages,
//!         &[Filter::eq("conversation_id", "c1")],
//!         Some(&Order::asc("created_at")),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod entities;
pub mod error;
pub mod memory;
pub mod migration;
pub mod query;
pub mod realtime;
pub mod row;
pub mod sqlite;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use query::{Filter, Order};
pub use realtime::{RealtimeHub, Subscription, SubscriptionId};
pub use row::{from_row, now_micros, to_row, Row};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tables consumed by the messaging core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    DirectConversations,
    PrivateMessages,
    MessageReadStatus,
    Profiles,
}

impl Table {
    /// Table name as seen by the backend
    pub fn name(&self) -> &'static str {
        match self {
            Table::DirectConversations => "direct_conversations",
            Table::PrivateMessages => "private_messages",
            Table::MessageReadStatus => "message_read_status",
            Table::Profiles => "profiles",
        }
    }

    /// Column sets that must be unique, primary key first.
    ///
    /// Conversations are unique on the ordered participant pair only; the
    /// reversed pair is a distinct key.
    pub fn unique_keys(&self) -> &'static [&'static [&'static str]] {
        const ID: &[&str] = &["id"];
        const PARTICIPANTS: &[&str] = &["participant_a_id", "participant_b_id"];
        const READER: &[&str] = &["conversation_id", "user_id"];

        match self {
            Table::DirectConversations => &[ID, PARTICIPANTS],
            Table::PrivateMessages | Table::Profiles => &[ID],
            Table::MessageReadStatus => &[READER],
        }
    }

    /// Fill the columns the server assigns on insert when the caller left
    /// them out.
    pub fn apply_server_defaults(&self, row: &mut Row) {
        let now = now_micros();
        match self {
            Table::DirectConversations => {
                row.entry("id")
                    .or_insert_with(|| uuid::Uuid::new_v4().to_string().into());
                row.entry("created_at").or_insert_with(|| now.into());
                row.entry("updated_at").or_insert_with(|| now.into());
            }
            Table::PrivateMessages => {
                row.entry("id")
                    .or_insert_with(|| uuid::Uuid::new_v4().to_string().into());
                row.entry("created_at").or_insert_with(|| now.into());
                row.entry("is_read").or_insert(false.into());
                row.entry("is_deleted").or_insert(false.into());
            }
            Table::MessageReadStatus => {
                row.entry("last_read_at").or_insert_with(|| now.into());
            }
            Table::Profiles => {}
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Remote data store used by the messaging client.
///
/// Every call is a round trip and therefore a suspension point. Each
/// operation is independently atomic; there are no multi-step transactions.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read rows matching every filter, optionally sorted
    async fn query(&self, table: Table, filters: &[Filter], order: Option<&Order>)
        -> Result<Vec<Row>>;

    /// Insert a single row and return it as persisted, server defaults included
    async fn insert(&self, table: Table, row: Row) -> Result<Row>;

    /// Insert the row, or overwrite the row sharing the same `conflict_key` values
    async fn upsert(&self, table: Table, row: Row, conflict_key: &[&str]) -> Result<()>;

    /// Delete every row matching all filters. An empty filter list is rejected.
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<()>;

    /// Receive every row inserted into `table` that matches `filter`
    async fn subscribe(&self, table: Table, filter: Filter) -> Result<Subscription>;

    /// Stop delivering rows to a subscription
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    /// Identifier of the signed-in user, if any
    async fn current_user(&self) -> Option<String>;
}
