//! SQLite store backend built on Sea-ORM

use async_trait::async_trait;
use parking_lot::RwLock;
use sea_orm::sea_query::{LikeExpr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::query::{Filter, Order};
use crate::realtime::{RealtimeHub, Subscription, SubscriptionId};
use crate::row::{to_row, Row};
use crate::{RemoteStore, Table};

/// Run `$body` with `$entity` bound to the entity module backing `$table`
macro_rules! with_entity {
    ($table:expr, $entity:ident => $body:block) => {
        match $table {
            $crate::Table::DirectConversations => {
                use $crate::entities::direct_conversations as $entity;
                $body
            }
            $crate::Table::PrivateMessages => {
                use $crate::entities::private_messages as $entity;
                $body
            }
            $crate::Table::MessageReadStatus => {
                use $crate::entities::message_read_status as $entity;
                $body
            }
            $crate::Table::Profiles => {
                use $crate::entities::profiles as $entity;
                $body
            }
        }
    };
}

/// Sea-ORM backed [`RemoteStore`]
#[derive(Clone)]
pub struct SqliteStore {
    db: DatabaseConnection,
    hub: Arc<RealtimeHub>,
    session: Arc<RwLock<Option<String>>>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let db_path_str = db_path
            .to_str()
            .ok_or_else(|| StoreError::InvalidQuery("Invalid database path".to_string()))?
            .replace('\\', "/");

        let db_url = format!("sqlite:{}?mode=rwc", db_path_str);
        let db = Database::connect(db_url.as_str()).await?;

        crate::migration::Migrator::up(&db, None).await?;

        info!("Message store initialized at {}", db_path.display());

        Ok(Self::with_connection(db))
    }

    /// Wrap an existing, already migrated connection
    pub fn with_connection(db: DatabaseConnection) -> Self {
        Self {
            db,
            hub: Arc::new(RealtimeHub::new()),
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Another handle on the same database, with its own session
    pub fn client(&self) -> Self {
        Self {
            db: self.db.clone(),
            hub: self.hub.clone(),
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.session.write() = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.session.write() = None;
    }
}

fn column<C>(table: Table, name: &str) -> Result<C>
where
    C: FromStr,
{
    C::from_str(name).map_err(|_| StoreError::UnknownColumn {
        table: table.name().to_string(),
        column: name.to_string(),
    })
}

fn db_value(value: &Value) -> Result<sea_orm::Value> {
    Ok(match value {
        Value::Null => Option::<String>::None.into(),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.into(),
            (None, Some(f)) => f.into(),
            _ => return Err(StoreError::InvalidQuery(format!("Unsupported number {}", n))),
        },
        Value::String(s) => s.clone().into(),
        other => {
            return Err(StoreError::InvalidQuery(format!(
                "Unsupported filter value {}",
                other
            )))
        }
    })
}

fn condition<C>(table: Table, filter: &Filter) -> Result<Condition>
where
    C: ColumnTrait + FromStr,
{
    let expr = match filter {
        Filter::Eq(col, v) => column::<C>(table, col)?.eq(db_value(v)?),
        Filter::Neq(col, v) => column::<C>(table, col)?.ne(db_value(v)?),
        Filter::Gt(col, v) => column::<C>(table, col)?.gt(db_value(v)?),
        Filter::Lt(col, v) => column::<C>(table, col)?.lt(db_value(v)?),
        Filter::In(col, values) => {
            let values = values.iter().map(db_value).collect::<Result<Vec<_>>>()?;
            column::<C>(table, col)?.is_in(values)
        }
        Filter::Contains(col, needle) => {
            column::<C>(table, col)?.like(LikeExpr::new(contains_pattern(needle)).escape('\\'))
        }
        Filter::Any(filters) => {
            let mut any = Condition::any();
            for f in filters {
                any = any.add(condition::<C>(table, f)?);
            }
            return Ok(any);
        }
    };
    Ok(Condition::all().add(expr))
}

/// `%needle%` with the needle's own wildcards escaped, so SQLite matches
/// them literally like the in-memory filter does
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn conditions<C>(table: Table, filters: &[Filter]) -> Result<Condition>
where
    C: ColumnTrait + FromStr,
{
    let mut all = Condition::all();
    for f in filters {
        all = all.add(condition::<C>(table, f)?);
    }
    Ok(all)
}

fn map_insert_err(table: Table, err: sea_orm::DbErr) -> StoreError {
    match err.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => StoreError::UniqueViolation {
            table: table.name().to_string(),
            columns: detail,
        },
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn query(
        &self,
        table: Table,
        filters: &[Filter],
        order: Option<&Order>,
    ) -> Result<Vec<Row>> {
        let rows = with_entity!(table, entity => {
            let mut select = entity::Entity::find()
                .filter(conditions::<entity::Column>(table, filters)?);
            if let Some(order) = order {
                let col = column::<entity::Column>(table, &order.column)?;
                let direction = if order.ascending {
                    sea_orm::Order::Asc
                } else {
                    sea_orm::Order::Desc
                };
                select = select.order_by(col, direction);
            }
            select
                .all(&self.db)
                .await?
                .iter()
                .map(to_row)
                .collect::<Result<Vec<Row>>>()?
        });

        debug!(%table, count = rows.len(), "Query served");
        Ok(rows)
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row> {
        table.apply_server_defaults(&mut row);

        let saved = with_entity!(table, entity => {
            let model: entity::Model = serde_json::from_value(Value::Object(row))?;
            let saved = entity::ActiveModel::from(model)
                .insert(&self.db)
                .await
                .map_err(|e| map_insert_err(table, e))?;
            to_row(&saved)?
        });

        debug!(%table, "Row inserted");
        self.hub.publish(table, &saved);
        Ok(saved)
    }

    async fn upsert(&self, table: Table, mut row: Row, conflict_key: &[&str]) -> Result<()> {
        if conflict_key.is_empty() {
            return Err(StoreError::InvalidQuery(
                "upsert requires a conflict key".to_string(),
            ));
        }

        let update_names: Vec<String> = row
            .keys()
            .filter(|k| !conflict_key.contains(&k.as_str()))
            .cloned()
            .collect();
        table.apply_server_defaults(&mut row);

        with_entity!(table, entity => {
            let keys = conflict_key
                .iter()
                .map(|name| column::<entity::Column>(table, name))
                .collect::<Result<Vec<_>>>()?;
            let updates = update_names
                .iter()
                .map(|name| column::<entity::Column>(table, name))
                .collect::<Result<Vec<_>>>()?;

            let mut on_conflict = OnConflict::columns(keys);
            if updates.is_empty() {
                on_conflict.do_nothing();
            } else {
                on_conflict.update_columns(updates);
            }

            let model: entity::Model = serde_json::from_value(Value::Object(row))?;
            entity::Entity::insert(entity::ActiveModel::from(model))
                .on_conflict(on_conflict)
                .exec_without_returning(&self.db)
                .await?;
        });

        debug!(%table, "Row upserted");
        Ok(())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<()> {
        if filters.is_empty() {
            return Err(StoreError::InvalidQuery(
                "delete requires at least one filter".to_string(),
            ));
        }

        let removed = with_entity!(table, entity => {
            entity::Entity::delete_many()
                .filter(conditions::<entity::Column>(table, filters)?)
                .exec(&self.db)
                .await?
                .rows_affected
        });

        debug!(%table, removed, "Rows deleted");
        Ok(())
    }

    async fn subscribe(&self, table: Table, filter: Filter) -> Result<Subscription> {
        Ok(self.hub.subscribe(table, filter))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.hub.unsubscribe(id);
        Ok(())
    }

    async fn current_user(&self) -> Option<String> {
        self.session.read().clone()
    }
}
