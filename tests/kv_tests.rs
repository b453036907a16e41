use pgwake::{KvConfig, PgKvStore, SetOptions};
use serde_json::json;
use std::time::Duration;

mod common;

async fn create_store(dsn: &str) -> PgKvStore {
    let pool = common::connect(dsn).await;
    let config = KvConfig {
        table: common::unique_name("t_kv"),
        ..KvConfig::default()
    };
    PgKvStore::new(pool, config).expect("failed to create kv store")
}

#[tokio::test]
async fn set_get_delete_round_trip() {
    let Some(dsn) = common::test_dsn() else {
        eprintln!("skipping: PGWAKE_TEST_DSN not set");
        return;
    };
    let store = create_store(&dsn).await;

    let key = ["session", "abc123"];
    let value = json!({"user": "alice", "roles": ["admin"]});
    store.set(&key, &value, SetOptions::default()).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Some(value));

    store.delete(&key).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), None);

    store.drop_table().await.unwrap();
}

#[tokio::test]
async fn absent_key_returns_none() {
    let Some(dsn) = common::test_dsn() else {
        eprintln!("skipping: PGWAKE_TEST_DSN not set");
        return;
    };
    let store = create_store(&dsn).await;
    assert_eq!(store.get(&["nope"]).await.unwrap(), None);
    store.drop_table().await.unwrap();
}

#[tokio::test]
async fn set_overwrites_existing_value() {
    let Some(dsn) = common::test_dsn() else {
        eprintln!("skipping: PGWAKE_TEST_DSN not set");
        return;
    };
    let store = create_store(&dsn).await;

    let key = ["counter"];
    store
        .set(&key, &json!(1), SetOptions::default())
        .await
        .unwrap();
    store
        .set(&key, &json!(2), SetOptions::default())
        .await
        .unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Some(json!(2)));

    store.drop_table().await.unwrap();
}

#[tokio::test]
async fn expired_entry_is_not_returned() {
    let Some(dsn) = common::test_dsn() else {
        eprintln!("skipping: PGWAKE_TEST_DSN not set");
        return;
    };
    let store = create_store(&dsn).await;

    let key = ["ephemeral"];
    store
        .set(
            &key,
            &json!("short lived"),
            SetOptions {
                ttl: Some(Duration::from_millis(200)),
            },
        )
        .await
        .unwrap();
    assert!(store.get(&key).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(store.get(&key).await.unwrap(), None);

    store.drop_table().await.unwrap();
}

#[tokio::test]
async fn mutating_calls_purge_expired_rows() {
    let Some(dsn) = common::test_dsn() else {
        eprintln!("skipping: PGWAKE_TEST_DSN not set");
        return;
    };
    let store = create_store(&dsn).await;
    let table = store.config().table.clone();

    store
        .set(
            &["stale"],
            &json!("old"),
            SetOptions {
                ttl: Some(Duration::from_millis(100)),
            },
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Any mutating call sweeps the expired row out of the table.
    store
        .set(&["fresh"], &json!("new"), SetOptions::default())
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&store.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    store.drop_table().await.unwrap();
}

#[tokio::test]
async fn initialize_and_drop_are_safe_in_any_order() {
    let Some(dsn) = common::test_dsn() else {
        eprintln!("skipping: PGWAKE_TEST_DSN not set");
        return;
    };
    let store = create_store(&dsn).await;

    store.drop_table().await.unwrap();
    store.initialize().await.unwrap();
    store.initialize().await.unwrap();
    store.drop_table().await.unwrap();
    store.drop_table().await.unwrap();
}
