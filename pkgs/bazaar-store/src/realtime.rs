//! Insert notifications shared by every store backend

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use crate::query::Filter;
use crate::row::Row;
use crate::Table;

/// Handle identifying a live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving side of a subscription. Dropping it ends delivery; the hub
/// prunes the closed channel on its next publish.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<Row>,
}

impl Subscription {
    /// Wait for the next inserted row. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Row> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<Row> {
        self.receiver.try_recv().ok()
    }
}

struct Subscriber {
    table: Table,
    filter: Filter,
    sender: mpsc::UnboundedSender<Row>,
}

/// Fan-out of inserted rows to matching subscribers
#[derive(Default)]
pub struct RealtimeHub {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, table: Table, filter: Filter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.subscribers.lock().insert(
            id,
            Subscriber {
                table,
                filter,
                sender,
            },
        );
        debug!(subscription = id, %table, "Subscription registered");

        Subscription {
            id: SubscriptionId(id),
            receiver,
        }
    }

    /// Remove a subscription. Returns false when it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.lock().remove(&id.0).is_some();
        if removed {
            debug!(subscription = id.0, "Subscription removed");
        }
        removed
    }

    /// Deliver an inserted row to every matching subscriber
    pub fn publish(&self, table: Table, row: &Row) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, sub| {
            if sub.sender.is_closed() {
                debug!(subscription = id, "Pruning closed subscription");
                return false;
            }
            if sub.table == table && sub.filter.matches(row) {
                return sub.sender.send(row.clone()).is_ok();
            }
            true
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
