//! Companion key-value store with time-to-live expiry.
//!
//! [`PgKvStore`] is the simple CRUD collaborator that ships alongside the
//! queue engine: values are keyed on a composite ordered key, stored as
//! JSONB, and may carry a TTL. Expired rows are purged opportunistically on
//! every mutating call, and `get` never returns an expired row.

use crate::config::KvConfig;
use crate::constants::{
    CREATE_KV_TABLE, DROP_KV_TABLE, KV_DELETE, KV_GET, KV_PURGE_EXPIRED, KV_SET,
};
use crate::error::{PgwakeError, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Options for [`PgKvStore::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Time-to-live; the entry expires this long after the set. `None` keeps
    /// the entry until deleted.
    pub ttl: Option<Duration>,
}

/// A PostgreSQL-backed key-value store.
///
/// Like [`crate::PgQueue`], the store borrows a shared pool and never closes
/// it.
pub struct PgKvStore {
    /// Shared connection pool for PostgreSQL
    pub pool: PgPool,
    config: KvConfig,
    initialized: AtomicBool,
    create_sql: String,
    drop_sql: String,
    get_sql: String,
    set_sql: String,
    delete_sql: String,
    purge_sql: String,
}

impl PgKvStore {
    /// Create a new store over `pool` with the given configuration.
    ///
    /// # Errors
    /// Returns [`PgwakeError::Config`] if the table name is not a valid
    /// PostgreSQL identifier.
    pub fn new(pool: PgPool, config: KvConfig) -> Result<Self> {
        config.validate()?;
        let create_sql = CREATE_KV_TABLE.replace("{table}", &config.table);
        let drop_sql = DROP_KV_TABLE.replace("{table}", &config.table);
        let get_sql = KV_GET.replace("{table}", &config.table);
        let set_sql = KV_SET.replace("{table}", &config.table);
        let delete_sql = KV_DELETE.replace("{table}", &config.table);
        let purge_sql = KV_PURGE_EXPIRED.replace("{table}", &config.table);
        let initialized = AtomicBool::new(config.initialized);
        Ok(Self {
            pool,
            config,
            initialized,
            create_sql,
            drop_sql,
            get_sql,
            set_sql,
            delete_sql,
            purge_sql,
        })
    }

    /// The configuration this store was constructed with.
    pub fn config(&self) -> &KvConfig {
        &self.config
    }

    /// Create the backing table if it does not exist. Idempotent and tolerant
    /// of the same concurrent-creation race as the queue initializer.
    pub async fn initialize(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        tracing::debug!(table = %self.config.table, "creating kv table if absent");
        match sqlx::query(&self.create_sql).execute(&self.pool).await {
            Ok(_) => {}
            Err(sqlx::Error::Database(db))
                if matches!(db.code().as_deref(), Some("42P07") | Some("23505")) =>
            {
                tracing::debug!(table = %self.config.table, "table already created by a concurrent initializer");
            }
            Err(error) => return Err(error.into()),
        }
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Drop the backing table unconditionally if present.
    pub async fn drop_table(&self) -> Result<()> {
        sqlx::query(&self.drop_sql).execute(&self.pool).await?;
        self.initialized.store(false, Ordering::Release);
        Ok(())
    }

    /// Fetch the value stored under `key`, or `None` if absent or expired.
    pub async fn get(&self, key: &[&str]) -> Result<Option<serde_json::Value>> {
        self.initialize().await?;
        let value = sqlx::query_scalar(&self.get_sql)
            .bind(owned_key(key))
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub async fn set(
        &self,
        key: &[&str],
        value: &serde_json::Value,
        options: SetOptions,
    ) -> Result<()> {
        self.initialize().await?;
        let expires = expiry_timestamp(options.ttl)?;
        self.purge_expired().await?;
        sqlx::query(&self.set_sql)
            .bind(owned_key(key))
            .bind(value)
            .bind(expires)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove the entry under `key` if present.
    pub async fn delete(&self, key: &[&str]) -> Result<()> {
        self.initialize().await?;
        self.purge_expired().await?;
        sqlx::query(&self.delete_sql)
            .bind(owned_key(key))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<()> {
        sqlx::query(&self.purge_sql).execute(&self.pool).await?;
        Ok(())
    }
}

fn owned_key(key: &[&str]) -> Vec<String> {
    key.iter().map(|part| part.to_string()).collect()
}

fn expiry_timestamp(ttl: Option<Duration>) -> Result<Option<DateTime<Utc>>> {
    match ttl {
        None => Ok(None),
        Some(ttl) => {
            let ttl = chrono::Duration::from_std(ttl).map_err(|_| PgwakeError::Config {
                message: format!("ttl of {ttl:?} exceeds the supported range"),
            })?;
            Ok(Some(Utc::now() + ttl))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ttl_means_no_expiry() {
        assert_eq!(expiry_timestamp(None).unwrap(), None);
    }

    #[test]
    fn ttl_is_added_to_now() {
        let before = Utc::now();
        let expires = expiry_timestamp(Some(Duration::from_secs(60)))
            .unwrap()
            .unwrap();
        assert!(expires >= before + chrono::Duration::seconds(60));
        assert!(expires <= Utc::now() + chrono::Duration::seconds(61));
    }

    #[test]
    fn absurd_ttl_is_rejected() {
        let result = expiry_timestamp(Some(Duration::from_secs(u64::MAX)));
        assert!(matches!(result, Err(PgwakeError::Config { .. })));
    }

    #[test]
    fn composite_key_round_trips() {
        assert_eq!(
            owned_key(&["session", "abc123"]),
            vec!["session".to_string(), "abc123".to_string()]
        );
    }
}
