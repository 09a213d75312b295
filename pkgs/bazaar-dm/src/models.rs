//! Typed records for the messaging tables and client-side views of them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of `profiles`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Stand-in for a participant whose profile could not be found
    pub fn placeholder(id: &str, username: &str) -> Self {
        Self {
            id: id.to_string(),
            username: username.to_string(),
            avatar_url: None,
        }
    }
}

/// A row of `direct_conversations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub participant_a_id: String,
    pub participant_b_id: String,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn involves(&self, user_id: &str) -> bool {
        self.participant_a_id == user_id || self.participant_b_id == user_id
    }

    /// The participant who is not `viewer`
    pub fn other_participant(&self, viewer: &str) -> &str {
        if self.participant_a_id == viewer {
            &self.participant_b_id
        } else {
            &self.participant_a_id
        }
    }
}

/// A row of `private_messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Insert payload for `direct_conversations`
#[derive(Debug, Clone, Serialize)]
pub struct NewConversation<'a> {
    pub participant_a_id: &'a str,
    pub participant_b_id: &'a str,
}

/// Insert payload for `private_messages`; the server fills in the rest
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage<'a> {
    pub conversation_id: &'a str,
    pub sender_id: &'a str,
    pub content: &'a str,
}

/// A row of `message_read_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStatusRecord {
    pub conversation_id: String,
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub last_read_at: DateTime<Utc>,
}

/// A conversation as seen by the viewer, joined with derived fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub other_user: UserProfile,
    pub last_message: Option<MessageRecord>,
    pub unread_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Timestamp used to order the conversation list
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_message
            .as_ref()
            .map(|m| m.created_at)
            .unwrap_or(self.created_at)
    }
}

/// A message shown before the store has confirmed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub temp_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// An entry of a visible message list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Pending(PendingMessage),
    Confirmed(MessageRecord),
}

impl Message {
    /// Temporary id for pending entries, server id otherwise
    pub fn id(&self) -> &str {
        match self {
            Message::Pending(p) => &p.temp_id,
            Message::Confirmed(r) => &r.id,
        }
    }

    pub fn sender_id(&self) -> &str {
        match self {
            Message::Pending(p) => &p.sender_id,
            Message::Confirmed(r) => &r.sender_id,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::Pending(p) => &p.content,
            Message::Confirmed(r) => &r.content,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Message::Pending(p) => p.created_at,
            Message::Confirmed(r) => r.created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Message::Pending(_))
    }

    pub fn as_confirmed(&self) -> Option<&MessageRecord> {
        match self {
            Message::Confirmed(r) => Some(r),
            Message::Pending(_) => None,
        }
    }
}
