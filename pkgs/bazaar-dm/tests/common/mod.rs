// Copyright 2025 Bazaar Team.
//
// Shared fixtures for the messaging client tests

#![allow(dead_code)]

use async_trait::async_trait;
use bazaar_dm::{MessagingClient, MessagingConfig, ViewEvent};
use bazaar_store::{
    Filter, MemoryStore, Order, RemoteStore, Row, Subscription, SubscriptionId, Table,
};
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Poll slowly enough that it never fires during a test
pub fn quiet_config() -> MessagingConfig {
    MessagingConfig {
        poll_interval_ms: 60_000,
        poll_error_interval_ms: 60_000,
        ..Default::default()
    }
}

pub fn fast_poll_config() -> MessagingConfig {
    MessagingConfig {
        poll_interval_ms: 30,
        poll_error_interval_ms: 50,
        ..Default::default()
    }
}

pub async fn seed_profiles(store: &dyn RemoteStore) {
    for (id, username) in [("alice", "alice"), ("bob", "bob"), ("carol", "carol")] {
        let row = match json!({"id": id, "username": username}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        store
            .insert(Table::Profiles, row)
            .await
            .expect("Failed to seed profile");
    }
}

pub fn message_row(conversation_id: &str, sender_id: &str, content: &str) -> Row {
    match json!({"conversation_id": conversation_id, "sender_id": sender_id, "content": content}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// A backend with alice and bob signed in on separate handles
pub struct Harness {
    pub backend: MemoryStore,
    pub alice_store: MemoryStore,
    pub bob_store: MemoryStore,
    pub alice: MessagingClient,
    pub bob: MessagingClient,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(quiet_config()).await
    }

    pub async fn with_config(config: MessagingConfig) -> Self {
        let backend = MemoryStore::new();
        seed_profiles(&backend).await;

        let alice_store = signed_in(&backend, "alice");
        let bob_store = signed_in(&backend, "bob");

        Self {
            alice: MessagingClient::new(Arc::new(alice_store.clone()), config.clone()),
            bob: MessagingClient::new(Arc::new(bob_store.clone()), config),
            backend,
            alice_store,
            bob_store,
        }
    }

    /// A client for `user_id` on the shared backend
    pub fn client_for(&self, user_id: &str, config: MessagingConfig) -> MessagingClient {
        MessagingClient::new(Arc::new(signed_in(&self.backend, user_id)), config)
    }

    /// A client for `user_id` whose subscriptions never deliver
    pub fn poll_only_client(&self, user_id: &str, config: MessagingConfig) -> MessagingClient {
        let store = PollOnlyStore(signed_in(&self.backend, user_id));
        MessagingClient::new(Arc::new(store), config)
    }
}

pub fn signed_in(backend: &MemoryStore, user_id: &str) -> MemoryStore {
    let client = backend.client();
    client.sign_in(user_id);
    client
}

/// Store wrapper that swallows insert notifications, leaving only the poll
pub struct PollOnlyStore(pub MemoryStore);

#[async_trait]
impl RemoteStore for PollOnlyStore {
    async fn query(
        &self,
        table: Table,
        filters: &[Filter],
        order: Option<&Order>,
    ) -> bazaar_store::Result<Vec<Row>> {
        self.0.query(table, filters, order).await
    }

    async fn insert(&self, table: Table, row: Row) -> bazaar_store::Result<Row> {
        self.0.insert(table, row).await
    }

    async fn upsert(
        &self,
        table: Table,
        row: Row,
        conflict_key: &[&str],
    ) -> bazaar_store::Result<()> {
        self.0.upsert(table, row, conflict_key).await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> bazaar_store::Result<()> {
        self.0.delete(table, filters).await
    }

    async fn subscribe(&self, _table: Table, _filter: Filter) -> bazaar_store::Result<Subscription> {
        self.0
            .subscribe(Table::Profiles, Filter::eq("id", "nobody"))
            .await
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> bazaar_store::Result<()> {
        self.0.unsubscribe(id).await
    }

    async fn current_user(&self) -> Option<String> {
        self.0.current_user().await
    }
}

/// Store wrapper that counts message fetches and read-marker writes.
///
/// Read-marker writes can be held at a gate with [`hold_reads`], and a row
/// can be queued to land right after the next message fetch returns.
///
/// [`hold_reads`]: InstrumentedStore::hold_reads
pub struct InstrumentedStore {
    inner: MemoryStore,
    message_queries: AtomicUsize,
    read_writes: AtomicUsize,
    hold_reads: AtomicBool,
    fail_fetches: AtomicBool,
    read_gate: Semaphore,
    after_fetch: parking_lot::Mutex<Option<(MemoryStore, Row)>>,
}

impl InstrumentedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            message_queries: AtomicUsize::new(0),
            read_writes: AtomicUsize::new(0),
            hold_reads: AtomicBool::new(false),
            fail_fetches: AtomicBool::new(false),
            read_gate: Semaphore::new(0),
            after_fetch: parking_lot::Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn message_queries(&self) -> usize {
        self.message_queries.load(Ordering::SeqCst)
    }

    pub fn read_writes(&self) -> usize {
        self.read_writes.load(Ordering::SeqCst)
    }

    /// Make every following message fetch fail
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Park every following read-marker write until [`release_reads`](Self::release_reads)
    pub fn hold_reads(&self) {
        self.hold_reads.store(true, Ordering::SeqCst);
    }

    pub fn release_reads(&self) {
        self.hold_reads.store(false, Ordering::SeqCst);
        self.read_gate.add_permits(1);
    }

    /// Insert `row` through `writer` once the next message fetch has its result
    pub fn insert_after_next_fetch(&self, writer: MemoryStore, row: Row) {
        *self.after_fetch.lock() = Some((writer, row));
    }
}

#[async_trait]
impl RemoteStore for InstrumentedStore {
    async fn query(
        &self,
        table: Table,
        filters: &[Filter],
        order: Option<&Order>,
    ) -> bazaar_store::Result<Vec<Row>> {
        if table != Table::PrivateMessages {
            return self.inner.query(table, filters, order).await;
        }

        self.message_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(bazaar_store::StoreError::Unavailable(
                "fetch disabled".to_string(),
            ));
        }
        let rows = self.inner.query(table, filters, order).await;
        let queued = self.after_fetch.lock().take();
        if let Some((writer, row)) = queued {
            writer
                .insert(Table::PrivateMessages, row)
                .await
                .expect("Failed to insert queued row");
        }
        rows
    }

    async fn insert(&self, table: Table, row: Row) -> bazaar_store::Result<Row> {
        self.inner.insert(table, row).await
    }

    async fn upsert(
        &self,
        table: Table,
        row: Row,
        conflict_key: &[&str],
    ) -> bazaar_store::Result<()> {
        if table == Table::MessageReadStatus {
            if self.hold_reads.load(Ordering::SeqCst) {
                let _permit = self.read_gate.acquire().await;
            }
            self.inner.upsert(table, row, conflict_key).await?;
            self.read_writes.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        self.inner.upsert(table, row, conflict_key).await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> bazaar_store::Result<()> {
        self.inner.delete(table, filters).await
    }

    async fn subscribe(&self, table: Table, filter: Filter) -> bazaar_store::Result<Subscription> {
        self.inner.subscribe(table, filter).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> bazaar_store::Result<()> {
        self.inner.unsubscribe(id).await
    }

    async fn current_user(&self) -> Option<String> {
        self.inner.current_user().await
    }
}

/// Let spawned tasks run until they block again
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Next event matching `pred`, skipping the others
pub async fn wait_for<F>(events: &mut UnboundedReceiver<ViewEvent>, mut pred: F) -> ViewEvent
where
    F: FnMut(&ViewEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.next().await {
            if pred(&event) {
                return event;
            }
        }
        panic!("View event stream ended");
    })
    .await
    .expect("Timed out waiting for view event")
}

/// Retry `check` until it holds or a few seconds have passed
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Condition not reached in time");
}
