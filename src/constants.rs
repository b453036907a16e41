//! SQL templates and default configuration values for pgwake.
//!
//! Statement templates carry a `{table}` placeholder that is rendered once at
//! engine construction with the configured table name. Table and channel
//! names are validated as SQL identifiers before rendering, so the templates
//! are never interpolated with untrusted input.

use std::time::Duration;

/// Default table backing the message queue
pub const DEFAULT_QUEUE_TABLE: &str = "pgwake_messages";
/// Default NOTIFY channel for wake-up hints
pub const DEFAULT_CHANNEL: &str = "pgwake_channel";
/// Default table backing the companion key-value store
pub const DEFAULT_KV_TABLE: &str = "pgwake_kv";
/// Default fallback polling period for the listen loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Delay hints at or below this threshold trigger an immediate drain instead
/// of a one-shot timer.
pub const IMMEDIATE_DELAY_THRESHOLD: Duration = Duration::from_millis(100);

/// PostgreSQL identifiers are capped at 63 bytes (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

pub const CREATE_QUEUE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS {table} (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        message JSONB NOT NULL,
        delay BIGINT NOT NULL DEFAULT 0,
        created TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT now()
    );
"#;

pub const DROP_QUEUE_TABLE: &str = r#"
    DROP TABLE IF EXISTS {table};
"#;

pub const INSERT_MESSAGE: &str = r#"
    INSERT INTO {table} (message, delay)
    VALUES ($1, $2)
    RETURNING id;
"#;

/// Claims the single oldest due row. The `FOR UPDATE SKIP LOCKED` subselect
/// makes competing claimers from other processes skip rows already being
/// deleted, so each row is removed by exactly one consumer.
pub const CLAIM_MESSAGE: &str = r#"
    DELETE FROM {table}
    WHERE id = (
        SELECT id
        FROM {table}
        WHERE created + (delay * interval '1 millisecond') <= now()
        ORDER BY created ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
    )
    RETURNING id, message, delay, created;
"#;

pub const PENDING_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM {table}
    WHERE created + (delay * interval '1 millisecond') <= now();
"#;

pub const NOTIFY_CHANNEL: &str = r#"
    SELECT pg_notify($1, $2);
"#;

pub const CREATE_KV_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS {table} (
        key TEXT[] PRIMARY KEY,
        value JSONB NOT NULL,
        created TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT now(),
        expires TIMESTAMP WITH TIME ZONE
    );
"#;

pub const DROP_KV_TABLE: &str = r#"
    DROP TABLE IF EXISTS {table};
"#;

pub const KV_GET: &str = r#"
    SELECT value
    FROM {table}
    WHERE key = $1 AND (expires IS NULL OR expires > now());
"#;

pub const KV_SET: &str = r#"
    INSERT INTO {table} (key, value, expires)
    VALUES ($1, $2, $3)
    ON CONFLICT (key)
    DO UPDATE SET value = EXCLUDED.value, created = now(), expires = EXCLUDED.expires;
"#;

pub const KV_DELETE: &str = r#"
    DELETE FROM {table}
    WHERE key = $1;
"#;

pub const KV_PURGE_EXPIRED: &str = r#"
    DELETE FROM {table}
    WHERE expires IS NOT NULL AND expires <= now();
"#;
