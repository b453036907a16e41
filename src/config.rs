//! Configuration types for pgwake.
//!
//! This module defines [`QueueConfig`] and [`KvConfig`], the immutable
//! construction-time settings for the queue engine and the companion
//! key-value store.
//!
//! ## How
//!
//! Create a config with defaults and override fields as needed, then pass it
//! to [`crate::PgQueue::new`] or [`crate::PgKvStore::new`]:
//!
//! ```rust
//! use pgwake::QueueConfig;
//! use std::time::Duration;
//!
//! let config = QueueConfig {
//!     table: "mail_queue".to_string(),
//!     poll_interval: Duration::from_secs(2),
//!     ..QueueConfig::default()
//! };
//! ```

use crate::constants::{
    DEFAULT_CHANNEL, DEFAULT_KV_TABLE, DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_TABLE,
    MAX_IDENTIFIER_LEN,
};
use crate::error::{PgwakeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`crate::PgQueue`] instance.
///
/// All fields are fixed for the life of the engine. Multiple engine instances
/// may share one pool as long as they address distinct table/channel names,
/// or use independent pools against the same table/channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Table backing the queue
    pub table: String,
    /// NOTIFY channel used for wake-up hints
    pub channel: String,
    /// Fallback wake-up period for listeners; bounds worst-case wake-up
    /// latency when a notification is missed
    pub poll_interval: Duration,
    /// Pre-seed the "table already exists" memo so the first call skips the
    /// schema check. Best-effort cache only; `initialize()` stays idempotent.
    pub initialized: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_QUEUE_TABLE.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            initialized: false,
        }
    }
}

impl QueueConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_identifier("table", &self.table)?;
        validate_identifier("channel", &self.channel)?;
        if self.poll_interval.is_zero() {
            return Err(PgwakeError::Config {
                message: "poll_interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for a [`crate::PgKvStore`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvConfig {
    /// Table backing the key-value store
    pub table: String,
    /// Pre-seed the "table already exists" memo
    pub initialized: bool,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_KV_TABLE.to_string(),
            initialized: false,
        }
    }
}

impl KvConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_identifier("table", &self.table)
    }
}

/// Validate that a name is safe to use as a PostgreSQL identifier.
///
/// Names must be non-empty, start with a letter or underscore, contain only
/// letters, digits, and underscores, and fit the identifier length limit.
/// This is what makes rendering the name into SQL templates safe.
pub(crate) fn validate_identifier(field: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PgwakeError::Config {
            message: format!("{field} name cannot be empty"),
        });
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(PgwakeError::Config {
            message: format!("{field} name '{name}' is too long (max {MAX_IDENTIFIER_LEN} bytes)"),
        });
    }
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(PgwakeError::Config {
                message: format!("{field} name '{name}' must start with a letter or underscore"),
            });
        }
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(PgwakeError::Config {
                message: format!(
                    "{field} name '{name}' contains invalid character '{c}'; only letters, digits, and underscores are allowed"
                ),
            });
        }
    }
    Ok(())
}
