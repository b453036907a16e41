//! Queue engine: storage initialization, enqueue, and claim operations.
//!
//! This module defines the [`PgQueue`] struct, the producer and consumer
//! interface for a PostgreSQL-backed, delay-aware message queue.
//!
//! ## What
//!
//! - [`PgQueue`] owns enqueue (insert + notify), claim (atomic
//!   delete-returning of the oldest due row), and idempotent schema setup.
//!   The listen loop lives in [`crate::listen`].
//!
//! ## How
//!
//! Construct a [`PgQueue`] over a shared [`PgPool`], then enqueue from
//! producers and either `claim` directly or run `listen` from consumers.
//!
//! ### Example
//!
//! ```rust,no_run
//! use pgwake::{PgQueue, QueueConfig, EnqueueOptions};
//! use serde_json::json;
//!
//! async fn produce(pool: sqlx::PgPool) -> pgwake::Result<()> {
//!     let queue = PgQueue::new(pool, QueueConfig::default())?;
//!     queue.enqueue(&json!("Hello, world!"), EnqueueOptions::default()).await?;
//!     Ok(())
//! }
//! ```

use crate::config::QueueConfig;
use crate::constants::{
    CLAIM_MESSAGE, CREATE_QUEUE_TABLE, DROP_QUEUE_TABLE, INSERT_MESSAGE, NOTIFY_CHANNEL,
    PENDING_COUNT,
};
use crate::error::{PgwakeError, Result};
use crate::types::QueueMessage;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Options for [`PgQueue::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// How long after insertion the message becomes due. Zero means due
    /// immediately.
    pub delay: Duration,
}

impl EnqueueOptions {
    /// Options with the given delay.
    pub fn delayed(delay: Duration) -> Self {
        Self { delay }
    }
}

/// Producer and consumer interface for a PostgreSQL-backed queue.
///
/// A `PgQueue` borrows a shared, externally managed connection pool; it never
/// closes it. Multiple instances may share one pool against distinct
/// table/channel names, and independent pools may target the same
/// table/channel; competing consumers coordinate only through the database.
pub struct PgQueue {
    /// Shared connection pool for PostgreSQL
    pub pool: PgPool,
    config: QueueConfig,
    /// Memo for "table exists"; best-effort cache, not a correctness
    /// guarantee. A fresh instance re-checks.
    initialized: AtomicBool,
    create_sql: String,
    drop_sql: String,
    insert_sql: String,
    claim_sql: String,
    pending_count_sql: String,
}

impl PgQueue {
    /// Create a new queue engine over `pool` with the given configuration.
    ///
    /// Validates the configured table and channel names and renders the SQL
    /// statements used by all queue operations.
    ///
    /// # Errors
    /// Returns [`PgwakeError::Config`] if the table or channel name is not a
    /// valid PostgreSQL identifier, or if the poll interval is zero.
    pub fn new(pool: PgPool, config: QueueConfig) -> Result<Self> {
        config.validate()?;
        let create_sql = CREATE_QUEUE_TABLE.replace("{table}", &config.table);
        let drop_sql = DROP_QUEUE_TABLE.replace("{table}", &config.table);
        let insert_sql = INSERT_MESSAGE.replace("{table}", &config.table);
        let claim_sql = CLAIM_MESSAGE.replace("{table}", &config.table);
        let pending_count_sql = PENDING_COUNT.replace("{table}", &config.table);
        let initialized = AtomicBool::new(config.initialized);
        Ok(Self {
            pool,
            config,
            initialized,
            create_sql,
            drop_sql,
            insert_sql,
            claim_sql,
            pending_count_sql,
        })
    }

    /// The configuration this engine was constructed with.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Create the backing table if it does not exist.
    ///
    /// Idempotent and concurrency-safe: two engine instances racing to create
    /// the same table may surface a duplicate-definition conflict from the
    /// server even under `IF NOT EXISTS`; that conflict is swallowed. Any
    /// other failure propagates.
    pub async fn initialize(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        tracing::debug!(table = %self.config.table, "creating queue table if absent");
        match sqlx::query(&self.create_sql).execute(&self.pool).await {
            Ok(_) => {}
            Err(error) if is_benign_duplicate(&error) => {
                tracing::debug!(table = %self.config.table, "table already created by a concurrent initializer");
            }
            Err(error) => return Err(error.into()),
        }
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Drop the backing table unconditionally if present.
    ///
    /// Safe to call regardless of initialization state, including twice in a
    /// row.
    pub async fn drop_table(&self) -> Result<()> {
        tracing::debug!(table = %self.config.table, "dropping queue table");
        sqlx::query(&self.drop_sql).execute(&self.pool).await?;
        self.initialized.store(false, Ordering::Release);
        Ok(())
    }

    /// Persist a message and publish a wake-up notification.
    ///
    /// The insert commits before the notification is sent, so a consumer
    /// woken by the hint is guaranteed to find the row. The notification
    /// carries only the string form of the delay in milliseconds; it is a
    /// wake-up hint, not a delivery mechanism.
    ///
    /// # Arguments
    /// * `payload` - JSON payload, stored verbatim
    /// * `options` - per-message delay (default zero)
    ///
    /// # Returns
    /// The server-assigned message ID.
    pub async fn enqueue(
        &self,
        payload: &serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<Uuid> {
        self.initialize().await?;
        let delay_ms = delay_to_millis(options.delay)?;

        let id: Uuid = sqlx::query_scalar(&self.insert_sql)
            .bind(payload)
            .bind(delay_ms)
            .fetch_one(&self.pool)
            .await?;
        tracing::debug!(message_id = %id, delay_ms, "enqueued message");

        sqlx::query(NOTIFY_CHANNEL)
            .bind(&self.config.channel)
            .bind(delay_ms.to_string())
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    /// Atomically claim the oldest due message, if any.
    ///
    /// Selects the lowest `created` among rows where `created + delay` has
    /// passed and deletes it in one statement. Concurrent claimers never
    /// remove the same row; ties on `created` are broken arbitrarily but each
    /// row still goes to exactly one consumer.
    pub async fn claim(&self) -> Result<Option<QueueMessage>> {
        self.initialize().await?;
        let claimed = sqlx::query_as::<_, QueueMessage>(&self.claim_sql)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(message) = &claimed {
            tracing::debug!(message_id = %message.id, "claimed message");
        }
        Ok(claimed)
    }

    /// Count of messages currently due.
    pub async fn pending_count(&self) -> Result<i64> {
        self.initialize().await?;
        let count = sqlx::query_scalar(&self.pending_count_sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Convert an enqueue delay to whole milliseconds for storage.
///
/// Delays that do not fit an `i64` millisecond count are rejected up front.
fn delay_to_millis(delay: Duration) -> Result<i64> {
    i64::try_from(delay.as_millis()).map_err(|_| PgwakeError::Config {
        message: format!("delay of {delay:?} exceeds the supported range"),
    })
}

/// Duplicate-definition conflicts two racing initializers can hit:
/// `42P07` (duplicate_table) and the `23505` unique violation on
/// `pg_type` that `CREATE TABLE IF NOT EXISTS` can still raise.
fn is_benign_duplicate(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("42P07") | Some("23505"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_QUEUE_TABLE;

    #[test]
    fn renders_table_into_statements() {
        let config = QueueConfig {
            table: "custom_messages".to_string(),
            ..QueueConfig::default()
        };
        let create_sql = CREATE_QUEUE_TABLE.replace("{table}", &config.table);
        let claim_sql = CLAIM_MESSAGE.replace("{table}", &config.table);
        assert!(create_sql.contains("custom_messages"));
        assert!(!create_sql.contains("{table}"));
        assert!(claim_sql.contains("custom_messages"));
        assert!(claim_sql.contains("FOR UPDATE SKIP LOCKED"));
    }

    #[test]
    fn default_table_renders() {
        let sql = INSERT_MESSAGE.replace("{table}", DEFAULT_QUEUE_TABLE);
        assert!(sql.contains(DEFAULT_QUEUE_TABLE));
    }

    #[test]
    fn zero_delay_is_zero_millis() {
        assert_eq!(delay_to_millis(Duration::ZERO).unwrap(), 0);
    }

    #[test]
    fn sub_millisecond_delay_truncates() {
        assert_eq!(delay_to_millis(Duration::from_micros(900)).unwrap(), 0);
    }

    #[test]
    fn three_second_delay() {
        assert_eq!(delay_to_millis(Duration::from_secs(3)).unwrap(), 3000);
    }

    #[test]
    fn absurd_delay_is_rejected() {
        let result = delay_to_millis(Duration::from_secs(u64::MAX));
        assert!(matches!(result, Err(PgwakeError::Config { .. })));
    }
}
