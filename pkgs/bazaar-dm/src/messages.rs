//! Message fetch, validation and insert

use bazaar_store::{from_row, to_row, Filter, Order, RemoteStore, Table};
use tracing::debug;

use crate::error::{MessagingError, Result};
use crate::models::{MessageRecord, NewMessage};

/// Trim a draft and check it against the length limit
pub fn validate_content(draft: &str, max_length: usize) -> Result<&str> {
    let content = draft.trim();
    if content.is_empty() {
        return Err(MessagingError::Validation(
            "Message cannot be empty".to_string(),
        ));
    }
    let length = content.chars().count();
    if length > max_length {
        return Err(MessagingError::Validation(format!(
            "Message is {} characters, limit is {}",
            length, max_length
        )));
    }
    Ok(content)
}

/// All messages of a conversation, oldest first
pub(crate) async fn list_messages(
    store: &dyn RemoteStore,
    conversation_id: &str,
) -> Result<Vec<MessageRecord>> {
    let rows = store
        .query(
            Table::PrivateMessages,
            &[Filter::eq("conversation_id", conversation_id)],
            Some(&Order::asc("created_at")),
        )
        .await?;
    debug!(conversation_id, count = rows.len(), "Messages fetched");
    crate::decode_rows(rows)
}

/// Insert an already validated message and decode the persisted row
pub(crate) async fn insert_message(
    store: &dyn RemoteStore,
    conversation_id: &str,
    sender_id: &str,
    content: &str,
) -> Result<MessageRecord> {
    let row = to_row(&NewMessage {
        conversation_id,
        sender_id,
        content,
    })?;
    let saved = store.insert(Table::PrivateMessages, row).await?;
    Ok(from_row(saved)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_trims_and_limits() {
        assert_eq!(validate_content("  hello \n", 10).unwrap(), "hello");
        assert!(matches!(
            validate_content(" \t ", 10),
            Err(MessagingError::Validation(_))
        ));
        assert!(validate_content(&"x".repeat(10), 10).is_ok());
        assert!(matches!(
            validate_content(&"x".repeat(11), 10),
            Err(MessagingError::Validation(_))
        ));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let draft = "é".repeat(5);
        assert!(validate_content(&draft, 5).is_ok());
    }
}
