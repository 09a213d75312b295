//! Ordered, deduplicating message list
//!
//! Every update path of an open conversation (initial load, optimistic
//! send, realtime delivery and poll) writes through [`MessageList`]. The
//! list stays sorted by `(created_at, id)` and never holds two entries for
//! the same logical message.

use std::collections::HashSet;

use crate::config::PollMerge;
use crate::models::{Message, MessageRecord, PendingMessage};

/// Outcome of reconciling one confirmed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Merge {
    /// The record was new and has been inserted
    Inserted,
    /// The record replaced the pending entry `temp_id`
    ConfirmedPending { temp_id: String },
    /// The record was already present; nothing changed
    Duplicate,
}

#[derive(Debug, Clone, Default)]
pub struct MessageList {
    entries: Vec<Message>,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from server records, dropping repeated ids
    pub fn from_records(records: impl IntoIterator<Item = MessageRecord>) -> Self {
        let mut seen = HashSet::new();
        let mut entries: Vec<Message> = records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .map(Message::Confirmed)
            .collect();
        entries.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Self { entries }
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|m| m.is_pending()).count()
    }

    /// Whether a confirmed entry with this server id is present
    pub fn contains_confirmed(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|m| m.as_confirmed().is_some_and(|r| r.id == id))
    }

    pub fn push_pending(&mut self, pending: PendingMessage) {
        self.insert_sorted(Message::Pending(pending));
    }

    pub fn remove_pending(&mut self, temp_id: &str) -> Option<PendingMessage> {
        let index = self
            .entries
            .iter()
            .position(|m| matches!(m, Message::Pending(p) if p.temp_id == temp_id))?;
        match self.entries.remove(index) {
            Message::Pending(p) => Some(p),
            Message::Confirmed(_) => None,
        }
    }

    /// Merge a confirmed record.
    ///
    /// A record whose id is already present is a duplicate. Otherwise it
    /// replaces the oldest pending entry with the same sender and content,
    /// if there is one, and is inserted at its sorted position.
    pub fn reconcile(&mut self, record: MessageRecord) -> Merge {
        if self.contains_confirmed(&record.id) {
            return Merge::Duplicate;
        }

        let outcome = match self.matching_pending(&record) {
            Some(index) => match self.entries.remove(index) {
                Message::Pending(p) => Merge::ConfirmedPending { temp_id: p.temp_id },
                Message::Confirmed(_) => Merge::Inserted,
            },
            None => Merge::Inserted,
        };

        self.insert_sorted(Message::Confirmed(record));
        outcome
    }

    /// Merge a full snapshot of the conversation. Returns true when the list
    /// changed.
    pub fn merge_snapshot(&mut self, records: Vec<MessageRecord>, strategy: PollMerge) -> bool {
        match strategy {
            PollMerge::Reconcile => records
                .into_iter()
                .fold(false, |changed, r| self.reconcile(r) != Merge::Duplicate || changed),
            PollMerge::ReplaceIfLonger => {
                if records.len() <= self.entries.len() {
                    return false;
                }

                // Records shown before this poll never confirm a pending entry
                let mut claimed = HashSet::new();
                let mut pending = Vec::new();
                for message in self.entries.drain(..) {
                    match message {
                        Message::Pending(p) => pending.push(p),
                        Message::Confirmed(r) => {
                            claimed.insert(r.id);
                        }
                    }
                }

                *self = Self::from_records(records);
                for p in pending {
                    match self.unclaimed_record_for(&p, &claimed) {
                        Some(id) => {
                            claimed.insert(id);
                        }
                        None => self.push_pending(p),
                    }
                }
                true
            }
        }
    }

    fn matching_pending(&self, record: &MessageRecord) -> Option<usize> {
        self.entries.iter().position(|m| match m {
            Message::Pending(p) => p.sender_id == record.sender_id && p.content == record.content,
            Message::Confirmed(_) => false,
        })
    }

    fn unclaimed_record_for(
        &self,
        pending: &PendingMessage,
        claimed: &HashSet<String>,
    ) -> Option<String> {
        self.entries
            .iter()
            .filter_map(Message::as_confirmed)
            .find(|r| {
                !claimed.contains(&r.id)
                    && r.sender_id == pending.sender_id
                    && r.content == pending.content
            })
            .map(|r| r.id.clone())
    }

    fn insert_sorted(&mut self, message: Message) {
        let key = sort_key(&message);
        let index = self.entries.partition_point(|m| sort_key(m) <= key);
        self.entries.insert(index, message);
    }
}

fn sort_key(message: &Message) -> (chrono::DateTime<chrono::Utc>, &str) {
    (message.created_at(), message.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    fn record(id: &str, sender: &str, content: &str, millis: i64) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            conversation_id: "c1".into(),
            sender_id: sender.into(),
            content: content.into(),
            created_at: at(millis),
            is_read: false,
            is_deleted: false,
        }
    }

    fn pending(temp_id: &str, sender: &str, content: &str, millis: i64) -> PendingMessage {
        PendingMessage {
            temp_id: temp_id.into(),
            conversation_id: "c1".into(),
            sender_id: sender.into(),
            content: content.into(),
            created_at: at(millis),
        }
    }

    fn ids(list: &MessageList) -> Vec<&str> {
        list.messages().iter().map(Message::id).collect()
    }

    #[test]
    fn test_from_records_sorts_and_dedups() {
        let list = MessageList::from_records(vec![
            record("m3", "bob", "c", 30),
            record("m1", "bob", "a", 10),
            record("m3", "bob", "c", 30),
            record("m2", "bob", "b", 20),
        ]);
        assert_eq!(ids(&list), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_reconcile_confirms_pending_and_ignores_repeats() {
        let mut list = MessageList::from_records(vec![record("m1", "bob", "hi", 10)]);
        list.push_pending(pending("temp-1", "alice", "hello", 20));

        let merge = list.reconcile(record("m2", "alice", "hello", 25));
        assert_eq!(
            merge,
            Merge::ConfirmedPending {
                temp_id: "temp-1".into()
            }
        );
        assert_eq!(ids(&list), vec!["m1", "m2"]);
        assert_eq!(list.pending_count(), 0);

        // The same record arriving again from another channel
        assert_eq!(list.reconcile(record("m2", "alice", "hello", 25)), Merge::Duplicate);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_identical_drafts_confirm_oldest_pending_first() {
        let mut list = MessageList::new();
        list.push_pending(pending("temp-1", "alice", "ok", 10));
        list.push_pending(pending("temp-2", "alice", "ok", 20));

        let first = list.reconcile(record("m1", "alice", "ok", 11));
        assert_eq!(first, Merge::ConfirmedPending { temp_id: "temp-1".into() });
        let second = list.reconcile(record("m2", "alice", "ok", 21));
        assert_eq!(second, Merge::ConfirmedPending { temp_id: "temp-2".into() });
        assert_eq!(ids(&list), vec!["m1", "m2"]);
    }

    #[test]
    fn test_out_of_order_arrival_is_sorted() {
        let mut list = MessageList::new();
        for (id, millis) in [("m3", 30), ("m1", 10), ("m4", 40), ("m2", 20)] {
            assert_eq!(list.reconcile(record(id, "bob", id, millis)), Merge::Inserted);
        }
        assert_eq!(ids(&list), vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_remove_pending_returns_draft() {
        let mut list = MessageList::new();
        list.push_pending(pending("temp-1", "alice", "  spaced draft ", 10));

        let removed = list.remove_pending("temp-1").unwrap();
        assert_eq!(removed.content, "  spaced draft ");
        assert!(list.is_empty());
        assert!(list.remove_pending("temp-1").is_none());
    }

    #[test]
    fn test_reconcile_snapshot_adds_only_new_records() {
        let mut list = MessageList::from_records(vec![record("m1", "bob", "a", 10)]);
        list.push_pending(pending("temp-1", "alice", "b", 15));

        let changed = list.merge_snapshot(
            vec![record("m1", "bob", "a", 10), record("m2", "alice", "b", 16)],
            PollMerge::Reconcile,
        );
        assert!(changed);
        assert_eq!(ids(&list), vec!["m1", "m2"]);

        let unchanged = list.merge_snapshot(
            vec![record("m1", "bob", "a", 10), record("m2", "alice", "b", 16)],
            PollMerge::Reconcile,
        );
        assert!(!unchanged);
    }

    #[test]
    fn test_replace_if_longer_keeps_shorter_snapshot_out() {
        let mut list = MessageList::from_records(vec![
            record("m1", "bob", "a", 10),
            record("m2", "bob", "b", 20),
        ]);

        assert!(!list.merge_snapshot(vec![record("m1", "bob", "a", 10)], PollMerge::ReplaceIfLonger));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_replace_if_longer_carries_unmatched_pending() {
        let base = Utc::now();
        let millis = |offset: i64| (base + Duration::milliseconds(offset)).timestamp_millis();

        let mut list = MessageList::new();
        list.push_pending(pending("temp-1", "alice", "sent", millis(0)));
        list.push_pending(pending("temp-2", "alice", "still flying", millis(5)));

        let changed = list.merge_snapshot(
            vec![
                record("m0", "bob", "earlier", millis(-100)),
                record("m1", "alice", "sent", millis(1)),
                record("m2", "bob", "reply", millis(2)),
            ],
            PollMerge::ReplaceIfLonger,
        );

        assert!(changed);
        assert_eq!(ids(&list), vec!["m0", "m1", "m2", "temp-2"]);
        assert_eq!(list.pending_count(), 1);
    }

    #[test]
    fn test_replace_if_longer_keeps_resent_pending() {
        let mut list = MessageList::from_records(vec![record("m0", "alice", "ok", 10)]);
        list.push_pending(pending("temp-1", "alice", "ok", 50));

        let changed = list.merge_snapshot(
            vec![
                record("m0", "alice", "ok", 10),
                record("m1", "bob", "sure", 20),
                record("m2", "bob", "see you", 30),
            ],
            PollMerge::ReplaceIfLonger,
        );

        assert!(changed);
        assert_eq!(ids(&list), vec!["m0", "m1", "m2", "temp-1"]);
        assert_eq!(list.pending_count(), 1);
    }

    #[test]
    fn test_no_duplication_across_mixed_channels() {
        let mut list = MessageList::from_records(vec![record("m1", "bob", "a", 10)]);

        // Optimistic send, then realtime, then the send response, then poll
        list.push_pending(pending("temp-1", "alice", "b", 20));
        list.reconcile(record("m2", "alice", "b", 21));
        list.reconcile(record("m2", "alice", "b", 21));
        list.merge_snapshot(
            vec![
                record("m1", "bob", "a", 10),
                record("m2", "alice", "b", 21),
                record("m3", "bob", "c", 30),
            ],
            PollMerge::Reconcile,
        );
        list.reconcile(record("m3", "bob", "c", 30));

        assert_eq!(ids(&list), vec!["m1", "m2", "m3"]);
    }
}
