//! Per-user read markers

use bazaar_store::{to_row, Filter, RemoteStore, Table};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::ReadStatusRecord;

const READ_STATUS_KEY: [&str; 2] = ["conversation_id", "user_id"];

/// Records when the signed-in user last viewed each conversation
#[derive(Clone)]
pub struct ReadTracker {
    store: Arc<dyn RemoteStore>,
}

impl ReadTracker {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Move the viewer's read marker for `conversation_id` to now
    pub async fn mark_read(&self, conversation_id: &str) -> Result<()> {
        let viewer = crate::require_viewer(self.store.as_ref()).await?;
        let row = to_row(&ReadStatusRecord {
            conversation_id: conversation_id.to_string(),
            user_id: viewer,
            last_read_at: Utc::now(),
        })?;

        self.store
            .upsert(Table::MessageReadStatus, row, &READ_STATUS_KEY)
            .await?;
        debug!(conversation_id, "Conversation marked read");
        Ok(())
    }

    /// The viewer's read marker, if the conversation was ever opened
    pub async fn last_read_at(&self, conversation_id: &str) -> Result<Option<DateTime<Utc>>> {
        let viewer = crate::require_viewer(self.store.as_ref()).await?;
        let rows = self
            .store
            .query(
                Table::MessageReadStatus,
                &[
                    Filter::eq("conversation_id", conversation_id),
                    Filter::eq("user_id", viewer),
                ],
                None,
            )
            .await?;

        let statuses: Vec<ReadStatusRecord> = crate::decode_rows(rows)?;
        Ok(statuses.into_iter().map(|s| s.last_read_at).max())
    }
}
