//! Error types for store operations

use thiserror::Error;

/// Errors returned by a [`RemoteStore`](crate::RemoteStore) backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unique constraint violated on {table}({columns})")]
    UniqueViolation { table: String, columns: String },
    #[error("Unknown column '{column}' on {table}")]
    UnknownColumn { table: String, column: String },
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Malformed row: {0}")]
    MalformedRow(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::UniqueViolation { .. } => true,
            StoreError::Database(e) => matches!(
                e.sql_err(),
                Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
