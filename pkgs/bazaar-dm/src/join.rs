//! Client-side join of conversations with profiles, messages and read markers

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::models::{Conversation, ConversationRecord, MessageRecord, ReadStatusRecord, UserProfile};

/// Index profiles by user id
pub fn profile_map(profiles: Vec<UserProfile>) -> HashMap<String, UserProfile> {
    profiles.into_iter().map(|p| (p.id.clone(), p)).collect()
}

/// Latest message by `created_at`, ties broken by id
pub fn last_message<'a, I>(messages: I) -> Option<&'a MessageRecord>
where
    I: IntoIterator<Item = &'a MessageRecord>,
{
    messages
        .into_iter()
        .max_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
}

/// Messages from anyone but `viewer` newer than `last_read_at`
pub fn unread_count<'a, I>(messages: I, viewer: &str, last_read_at: DateTime<Utc>) -> usize
where
    I: IntoIterator<Item = &'a MessageRecord>,
{
    messages
        .into_iter()
        .filter(|m| m.sender_id != viewer && m.created_at > last_read_at)
        .count()
}

/// Derive the viewer's conversation list.
///
/// Missing profiles become a placeholder named `unknown_user_name`, and a
/// missing read marker counts as never read. The result is ordered by latest
/// activity, newest first, with the conversation id as tie-breaker.
pub fn enrich_conversations(
    viewer: &str,
    conversations: Vec<ConversationRecord>,
    profiles: &HashMap<String, UserProfile>,
    messages: Vec<MessageRecord>,
    read_statuses: Vec<ReadStatusRecord>,
    unknown_user_name: &str,
) -> Vec<Conversation> {
    let mut by_conversation: HashMap<String, Vec<MessageRecord>> = HashMap::new();
    for message in messages {
        by_conversation
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }

    let last_read: HashMap<String, DateTime<Utc>> = read_statuses
        .into_iter()
        .filter(|s| s.user_id == viewer)
        .map(|s| (s.conversation_id, s.last_read_at))
        .collect();

    let mut enriched: Vec<Conversation> = conversations
        .into_iter()
        .map(|record| {
            let other_id = record.other_participant(viewer);
            let other_user = profiles
                .get(other_id)
                .cloned()
                .unwrap_or_else(|| UserProfile::placeholder(other_id, unknown_user_name));

            let thread = by_conversation
                .get(&record.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let read_at = last_read
                .get(&record.id)
                .copied()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

            Conversation {
                other_user,
                last_message: last_message(thread).cloned(),
                unread_count: unread_count(thread, viewer, read_at),
                id: record.id,
                created_at: record.created_at,
                updated_at: record.updated_at,
            }
        })
        .collect();

    enriched.sort_by_key(|c| Reverse((c.activity_at(), c.id.clone())));
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn conversation(id: &str, a: &str, b: &str, created: i64) -> ConversationRecord {
        ConversationRecord {
            id: id.into(),
            participant_a_id: a.into(),
            participant_b_id: b.into(),
            created_at: at(created),
            updated_at: at(created),
        }
    }

    fn message(id: &str, conversation_id: &str, sender: &str, secs: i64) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender.into(),
            content: format!("message {}", id),
            created_at: at(secs),
            is_read: false,
            is_deleted: false,
        }
    }

    fn read(conversation_id: &str, user: &str, secs: i64) -> ReadStatusRecord {
        ReadStatusRecord {
            conversation_id: conversation_id.into(),
            user_id: user.into(),
            last_read_at: at(secs),
        }
    }

    #[test]
    fn test_unread_counts_only_other_participant_after_marker() {
        let thread = vec![
            message("m1", "c1", "bob", 10),
            message("m2", "c1", "bob", 20),
            message("m3", "c1", "alice", 30),
        ];

        assert_eq!(unread_count(&thread, "alice", DateTime::<Utc>::UNIX_EPOCH), 2);
        assert_eq!(unread_count(&thread, "alice", at(15)), 1);
        assert_eq!(unread_count(&thread, "alice", at(20)), 0);
    }

    #[test]
    fn test_last_message_breaks_ties_by_id() {
        let thread = vec![message("b", "c1", "bob", 10), message("a", "c1", "bob", 10)];
        assert_eq!(last_message(&thread).unwrap().id, "b");
        assert!(last_message(&[]).is_none());
    }

    #[test]
    fn test_enrich_joins_and_orders_by_activity() {
        let profiles = profile_map(vec![UserProfile {
            id: "bob".into(),
            username: "Bob".into(),
            avatar_url: None,
        }]);
        let conversations = vec![
            conversation("c1", "alice", "bob", 1),
            conversation("c2", "carol", "alice", 50),
            conversation("c3", "alice", "dave", 5),
        ];
        let messages = vec![
            message("m1", "c1", "bob", 100),
            message("m2", "c1", "bob", 110),
            message("m3", "c3", "dave", 20),
        ];
        let statuses = vec![read("c1", "alice", 105), read("c1", "bob", 1000)];

        let list = enrich_conversations(
            "alice",
            conversations,
            &profiles,
            messages,
            statuses,
            "Unknown User",
        );

        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);

        assert_eq!(list[0].other_user.username, "Bob");
        assert_eq!(list[0].last_message.as_ref().unwrap().id, "m2");
        assert_eq!(list[0].unread_count, 1);

        assert_eq!(list[1].other_user.id, "carol");
        assert_eq!(list[1].other_user.username, "Unknown User");
        assert!(list[1].last_message.is_none());
        assert_eq!(list[1].unread_count, 0);

        assert_eq!(list[2].unread_count, 1);
    }

    #[test]
    fn test_equal_activity_orders_by_id() {
        let conversations = vec![
            conversation("a", "alice", "bob", 7),
            conversation("b", "alice", "carol", 7),
        ];
        let list = enrich_conversations(
            "alice",
            conversations,
            &HashMap::new(),
            vec![],
            vec![],
            "Unknown User",
        );
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
