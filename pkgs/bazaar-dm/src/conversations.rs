//! Conversation discovery, creation and removal

use bazaar_store::{to_row, Filter, Order, RemoteStore, Table};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::MessagingConfig;
use crate::error::{MessagingError, Result};
use crate::join::{enrich_conversations, profile_map};
use crate::models::{
    Conversation, ConversationRecord, MessageRecord, NewConversation, ReadStatusRecord,
    UserProfile,
};

/// Reads and writes `direct_conversations` on behalf of the signed-in user
#[derive(Clone)]
pub struct ConversationRepository {
    store: Arc<dyn RemoteStore>,
    config: Arc<MessagingConfig>,
}

impl ConversationRepository {
    pub fn new(store: Arc<dyn RemoteStore>, config: Arc<MessagingConfig>) -> Self {
        Self { store, config }
    }

    /// The viewer's conversations, most recently active first.
    ///
    /// Returns an empty list when nobody is signed in.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let Some(viewer) = self.store.current_user().await else {
            debug!("No signed-in user, conversation list is empty");
            return Ok(Vec::new());
        };

        let rows = self
            .store
            .query(
                Table::DirectConversations,
                &[Filter::any([
                    Filter::eq("participant_a_id", viewer.as_str()),
                    Filter::eq("participant_b_id", viewer.as_str()),
                ])],
                Some(&Order::desc("updated_at")),
            )
            .await?;
        let records: Vec<ConversationRecord> = crate::decode_rows(rows)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let other_ids: BTreeSet<&str> = records
            .iter()
            .map(|c| c.other_participant(&viewer))
            .collect();
        let conversation_ids: Vec<&str> = records.iter().map(|c| c.id.as_str()).collect();

        let profiles = self.fetch_profiles(&other_ids).await?;

        let message_filters = [Filter::is_in("conversation_id", conversation_ids.iter().copied())];
        let status_filters = [
            Filter::is_in("conversation_id", conversation_ids.iter().copied()),
            Filter::eq("user_id", viewer.as_str()),
        ];
        let (message_rows, status_rows) = tokio::try_join!(
            self.store
                .query(Table::PrivateMessages, &message_filters, None),
            self.store
                .query(Table::MessageReadStatus, &status_filters, None),
        )?;

        let messages: Vec<MessageRecord> = crate::decode_rows(message_rows)?;
        let statuses: Vec<ReadStatusRecord> = crate::decode_rows(status_rows)?;

        let conversations = enrich_conversations(
            &viewer,
            records,
            &profiles,
            messages,
            statuses,
            &self.config.unknown_user_name,
        );
        debug!(count = conversations.len(), "Conversations listed");
        Ok(conversations)
    }

    /// Id of the conversation between the viewer and `other_user_id`,
    /// creating it on first contact.
    pub async fn get_or_create_direct_conversation(&self, other_user_id: &str) -> Result<String> {
        let viewer = crate::require_viewer(self.store.as_ref()).await?;
        let other = other_user_id.trim();
        if other.is_empty() {
            return Err(MessagingError::Validation(
                "Other user id cannot be empty".to_string(),
            ));
        }
        if other == viewer {
            return Err(MessagingError::Validation(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }

        if let Some(existing) = self.find_direct(&viewer, other).await? {
            return Ok(existing.id);
        }

        let row = to_row(&NewConversation {
            participant_a_id: &viewer,
            participant_b_id: other,
        })?;
        match self.store.insert(Table::DirectConversations, row).await {
            Ok(saved) => {
                let record: ConversationRecord = bazaar_store::from_row(saved)?;
                info!(conversation_id = %record.id, other, "Conversation created");
                Ok(record.id)
            }
            Err(e) if e.is_unique_violation() => {
                // Lost a race with a concurrent create for the same pair
                warn!(other, "Conversation already created, looking it up again");
                match self.find_direct(&viewer, other).await? {
                    Some(existing) => Ok(existing.id),
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A conversation the viewer participates in
    pub async fn get_conversation(&self, conversation_id: &str) -> Result<ConversationRecord> {
        let viewer = crate::require_viewer(self.store.as_ref()).await?;
        let rows = self
            .store
            .query(
                Table::DirectConversations,
                &[Filter::eq("id", conversation_id)],
                None,
            )
            .await?;

        let records: Vec<ConversationRecord> = crate::decode_rows(rows)?;
        records
            .into_iter()
            .find(|c| c.involves(&viewer))
            .ok_or_else(|| MessagingError::NotFound(format!("conversation {}", conversation_id)))
    }

    /// Remove a conversation together with its messages and read markers
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let record = self.get_conversation(conversation_id).await?;
        let by_conversation = [Filter::eq("conversation_id", record.id.as_str())];

        self.store
            .delete(Table::MessageReadStatus, &by_conversation)
            .await?;
        self.store
            .delete(Table::PrivateMessages, &by_conversation)
            .await?;
        self.store
            .delete(
                Table::DirectConversations,
                &[Filter::eq("id", record.id.as_str())],
            )
            .await?;

        info!(conversation_id, "Conversation deleted");
        Ok(())
    }

    /// Unread messages across all of the viewer's conversations
    pub async fn total_unread(&self) -> Result<usize> {
        Ok(self
            .list_conversations()
            .await?
            .iter()
            .map(|c| c.unread_count)
            .sum())
    }

    /// Profiles whose username contains `query`, the viewer excluded
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut filters = vec![Filter::contains("username", query)];
        if let Some(viewer) = self.store.current_user().await {
            filters.push(Filter::neq("id", viewer));
        }

        let rows = self
            .store
            .query(Table::Profiles, &filters, Some(&Order::asc("username")))
            .await?;
        crate::decode_rows(rows)
    }

    async fn find_direct(&self, viewer: &str, other: &str) -> Result<Option<ConversationRecord>> {
        let pair = [viewer, other];
        let rows = self
            .store
            .query(
                Table::DirectConversations,
                &[
                    Filter::is_in("participant_a_id", pair),
                    Filter::is_in("participant_b_id", pair),
                ],
                Some(&Order::asc("created_at")),
            )
            .await?;

        let records: Vec<ConversationRecord> = crate::decode_rows(rows)?;
        Ok(records
            .into_iter()
            .find(|c| c.participant_a_id != c.participant_b_id))
    }

    async fn fetch_profiles(
        &self,
        ids: &BTreeSet<&str>,
    ) -> Result<std::collections::HashMap<String, UserProfile>> {
        if ids.is_empty() {
            return Ok(Default::default());
        }
        let rows = self
            .store
            .query(
                Table::Profiles,
                &[Filter::is_in("id", ids.iter().copied())],
                None,
            )
            .await?;
        Ok(profile_map(crate::decode_rows(rows)?))
    }
}
