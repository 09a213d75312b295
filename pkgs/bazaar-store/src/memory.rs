//! In-process store backend
//!
//! All handles created with [`MemoryStore::client`] share one set of tables
//! and one realtime hub, the way several devices share a hosted backend.
//! Session and reachability are per handle.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::query::{Filter, Order};
use crate::realtime::{RealtimeHub, Subscription, SubscriptionId};
use crate::row::Row;
use crate::{RemoteStore, Table};

#[derive(Default)]
struct Tables {
    rows: Mutex<HashMap<Table, Vec<Row>>>,
    hub: RealtimeHub,
}

/// In-memory [`RemoteStore`]
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Tables>,
    session: Arc<RwLock<Option<String>>>,
    reachable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty backend with a signed-out handle
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Tables::default()),
            session: Arc::new(RwLock::new(None)),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Another handle on the same tables, with its own session
    pub fn client(&self) -> Self {
        Self {
            tables: self.tables.clone(),
            session: Arc::new(RwLock::new(None)),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.session.write() = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.session.write() = None;
    }

    /// Simulate losing the connection. Every call on this handle fails with
    /// [`StoreError::Unavailable`] until reachability is restored.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of rows currently stored in `table`
    pub fn row_count(&self, table: Table) -> usize {
        self.tables
            .rows
            .lock()
            .get(&table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Number of live subscriptions across all handles
    pub fn subscriber_count(&self) -> usize {
        self.tables.hub.subscriber_count()
    }

    async fn round_trip(&self) -> Result<()> {
        tokio::task::yield_now().await;
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("network unreachable".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn same_key(a: &Row, b: &Row, columns: &[&str]) -> bool {
    columns.iter().all(|c| a.get(*c) == b.get(*c))
}

fn check_unique(table: Table, rows: &[Row], candidate: &Row, skip: Option<usize>) -> Result<()> {
    for columns in table.unique_keys() {
        let clash = rows
            .iter()
            .enumerate()
            .any(|(i, existing)| Some(i) != skip && same_key(existing, candidate, columns));
        if clash {
            return Err(StoreError::UniqueViolation {
                table: table.name().to_string(),
                columns: columns.join(", "),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn query(
        &self,
        table: Table,
        filters: &[Filter],
        order: Option<&Order>,
    ) -> Result<Vec<Row>> {
        self.round_trip().await?;

        let rows = self.tables.rows.lock();
        let mut matched: Vec<Row> = rows
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            matched.sort_by(|a, b| order.compare(a, b));
        }

        debug!(%table, count = matched.len(), "Query served");
        Ok(matched)
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row> {
        self.round_trip().await?;

        table.apply_server_defaults(&mut row);
        {
            let mut tables = self.tables.rows.lock();
            let rows = tables.entry(table).or_default();
            check_unique(table, rows, &row, None)?;
            rows.push(row.clone());
        }

        debug!(%table, "Row inserted");
        self.tables.hub.publish(table, &row);
        Ok(row)
    }

    async fn upsert(&self, table: Table, mut row: Row, conflict_key: &[&str]) -> Result<()> {
        self.round_trip().await?;

        if conflict_key.is_empty() {
            return Err(StoreError::InvalidQuery(
                "upsert requires a conflict key".to_string(),
            ));
        }

        let mut tables = self.tables.rows.lock();
        let rows = tables.entry(table).or_default();

        match rows.iter().position(|r| same_key(r, &row, conflict_key)) {
            Some(index) => {
                let mut merged = rows[index].clone();
                merged.extend(row);
                check_unique(table, rows, &merged, Some(index))?;
                rows[index] = merged;
                debug!(%table, "Row updated by upsert");
            }
            None => {
                table.apply_server_defaults(&mut row);
                check_unique(table, rows, &row, None)?;
                rows.push(row);
                debug!(%table, "Row inserted by upsert");
            }
        }

        Ok(())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<()> {
        self.round_trip().await?;

        if filters.is_empty() {
            return Err(StoreError::InvalidQuery(
                "delete requires at least one filter".to_string(),
            ));
        }

        let mut tables = self.tables.rows.lock();
        if let Some(rows) = tables.get_mut(&table) {
            let before = rows.len();
            rows.retain(|row| !filters.iter().all(|f| f.matches(row)));
            debug!(%table, removed = before - rows.len(), "Rows deleted");
        }

        Ok(())
    }

    async fn subscribe(&self, table: Table, filter: Filter) -> Result<Subscription> {
        self.round_trip().await?;
        Ok(self.tables.hub.subscribe(table, filter))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        // Local bookkeeping only; succeeds even while unreachable.
        self.tables.hub.unsubscribe(id);
        Ok(())
    }

    async fn current_user(&self) -> Option<String> {
        self.session.read().clone()
    }
}
