//! Messaging client facade

use bazaar_store::RemoteStore;
use futures::channel::mpsc;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::MessagingConfig;
use crate::conversations::ConversationRepository;
use crate::error::Result;
use crate::messages::{insert_message, list_messages, validate_content};
use crate::models::{Conversation, ConversationRecord, MessageRecord, UserProfile};
use crate::read_state::ReadTracker;
use crate::view::{ConversationView, ViewEvent};

/// Entry point for the presentation layer.
///
/// Cheap to clone; clones share the same store handle and configuration.
#[derive(Clone)]
pub struct MessagingClient {
    store: Arc<dyn RemoteStore>,
    config: Arc<MessagingConfig>,
    conversations: ConversationRepository,
    reads: ReadTracker,
}

impl MessagingClient {
    pub fn new(store: Arc<dyn RemoteStore>, config: MessagingConfig) -> Self {
        let config = Arc::new(config);
        Self {
            conversations: ConversationRepository::new(store.clone(), config.clone()),
            reads: ReadTracker::new(store.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    /// The signed-in user, if any
    pub async fn viewer(&self) -> Option<String> {
        self.store.current_user().await
    }

    #[instrument(skip(self))]
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.conversations.list_conversations().await
    }

    #[instrument(skip(self))]
    pub async fn get_or_create_direct_conversation(&self, other_user_id: &str) -> Result<String> {
        self.conversations
            .get_or_create_direct_conversation(other_user_id)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_conversation(&self, conversation_id: &str) -> Result<ConversationRecord> {
        self.conversations.get_conversation(conversation_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        self.conversations.delete_conversation(conversation_id).await
    }

    #[instrument(skip(self))]
    pub async fn total_unread(&self) -> Result<usize> {
        self.conversations.total_unread().await
    }

    #[instrument(skip(self))]
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>> {
        self.conversations.search_users(query).await
    }

    /// Messages of a conversation the viewer participates in, oldest first
    #[instrument(skip(self))]
    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>> {
        let record = self.conversations.get_conversation(conversation_id).await?;
        list_messages(self.store.as_ref(), &record.id).await
    }

    /// Send without an open view: validate, insert, return the stored record
    #[instrument(skip(self, content))]
    pub async fn send_message(&self, conversation_id: &str, content: &str) -> Result<MessageRecord> {
        let content = validate_content(content, self.config.max_message_length)?;
        let viewer = crate::require_viewer(self.store.as_ref()).await?;
        let record = self.conversations.get_conversation(conversation_id).await?;
        insert_message(self.store.as_ref(), &record.id, &viewer, content).await
    }

    #[instrument(skip(self))]
    pub async fn mark_read(&self, conversation_id: &str) -> Result<()> {
        self.reads.mark_read(conversation_id).await
    }

    /// When the viewer last read the conversation
    #[instrument(skip(self))]
    pub async fn last_read_at(
        &self,
        conversation_id: &str,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        self.reads.last_read_at(conversation_id).await
    }

    /// Open a live view of a conversation
    #[instrument(skip(self))]
    pub async fn open_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<(ConversationView, mpsc::UnboundedReceiver<ViewEvent>)> {
        ConversationView::open(self.store.clone(), self.config.clone(), conversation_id).await
    }

    /// Create the conversation with `other_user_id` if needed and send the
    /// first message
    #[instrument(skip(self, content))]
    pub async fn start_conversation(
        &self,
        other_user_id: &str,
        content: &str,
    ) -> Result<(String, MessageRecord)> {
        validate_content(content, self.config.max_message_length)?;
        let conversation_id = self
            .conversations
            .get_or_create_direct_conversation(other_user_id)
            .await?;
        let record = self.send_message(&conversation_id, content).await?;
        info!(%conversation_id, "Conversation started");
        Ok((conversation_id, record))
    }
}
