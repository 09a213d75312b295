//! Error types for messaging operations

use bazaar_store::StoreError;
use thiserror::Error;

/// Errors that can occur in messaging operations
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("No signed-in user")]
    AuthRequired,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MessagingError {
    /// Whether repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, MessagingError::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, MessagingError>;
