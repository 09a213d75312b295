//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MessagingError, Result};

/// How a poll snapshot is merged into an open conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMerge {
    /// Rebuild the list from the snapshot only when it holds more entries
    ReplaceIfLonger,
    /// Feed every snapshot record through reconciliation
    #[default]
    Reconcile,
}

/// Configuration for [`MessagingClient`](crate::MessagingClient)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Interval in milliseconds between poll fetches (default: 3000)
    pub poll_interval_ms: u64,

    /// Interval in milliseconds after a failed poll fetch (default: 5000)
    pub poll_error_interval_ms: u64,

    /// Maximum message length in characters (default: 1000)
    pub max_message_length: usize,

    /// Prefix for temporary ids of pending messages (default: "temp-")
    pub temp_id_prefix: String,

    /// Username shown when a profile lookup misses (default: "Unknown User")
    pub unknown_user_name: String,

    /// Poll snapshot merge strategy (default: Reconcile)
    pub poll_merge: PollMerge,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            poll_error_interval_ms: 5000,
            max_message_length: 1000,
            temp_id_prefix: "temp-".to_string(),
            unknown_user_name: "Unknown User".to_string(),
            poll_merge: PollMerge::default(),
        }
    }
}

impl MessagingConfig {
    /// Load a configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MessagingError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| MessagingError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_error_interval(&self) -> Duration {
        Duration::from_millis(self.poll_error_interval_ms)
    }
}
