use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tokio::sync::OnceCell;

use super::{
    error::{StoreError, StoreResult},
    schema::{Collection, SCHEMA_VERSION, index_token},
    traits::LocalStore,
};
use crate::config::SqliteConfig;

/// SQLite-backed local store.
///
/// Records live in a single `records` table keyed by `(collection, key)`;
/// secondary index entries live in `record_indexes` and are rewritten inside
/// the same transaction as the record.
pub struct SqliteLocalStore {
    config: SqliteConfig,
    pool: OnceCell<SqlitePool>,
}

impl SqliteLocalStore {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    fn pool(&self) -> StoreResult<&SqlitePool> {
        self.pool.get().ok_or(StoreError::NotInitialized)
    }

    async fn connect(&self) -> StoreResult<SqlitePool> {
        let cfg = &self.config;
        let busy_timeout = Duration::from_millis(cfg.busy_timeout_ms);

        let pool = if cfg.is_in_memory() {
            // Every connection to `:memory:` is its own database, so pin one.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(
                    SqliteConnectOptions::from_str("sqlite::memory:")?.busy_timeout(busy_timeout),
                )
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(cfg.max_connections)
                .connect_with(
                    SqliteConnectOptions::new()
                        .filename(&cfg.path)
                        .create_if_missing(cfg.create_if_missing)
                        .journal_mode(if cfg.wal_mode {
                            SqliteJournalMode::Wal
                        } else {
                            SqliteJournalMode::Delete
                        })
                        .busy_timeout(busy_timeout),
                )
                .await?
        };
        Ok(pool)
    }
}

async fn migrate(pool: &SqlitePool) -> StoreResult<()> {
    let mut migrator = sqlx::migrate!("./migrations_sqlx/sqlite");
    // A newer binary may have added migrations this one does not know about.
    migrator.set_ignore_missing(true);
    migrator.run(pool).await?;

    let stored: Option<String> =
        sqlx::query_scalar("SELECT value FROM store_meta WHERE key = 'schema_version'")
            .fetch_optional(pool)
            .await?;
    let stored = stored.and_then(|v| v.parse::<i64>().ok());

    match stored {
        Some(version) if version > SCHEMA_VERSION => {
            tracing::warn!(
                stored = version,
                supported = SCHEMA_VERSION,
                "Local store was written by a newer schema; opening it unchanged"
            );
        }
        Some(version) if version == SCHEMA_VERSION => {}
        previous => {
            sqlx::query(
                r#"
                INSERT INTO store_meta (key, value) VALUES ('schema_version', ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(SCHEMA_VERSION.to_string())
            .execute(pool)
            .await?;
            tracing::info!(
                from = ?previous,
                to = SCHEMA_VERSION,
                "Local store schema version recorded"
            );
        }
    }
    Ok(())
}

fn parse_body(body: &str) -> StoreResult<Value> {
    Ok(serde_json::from_str(body)?)
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn init(&self) -> StoreResult<()> {
        // The pool is published only once the schema exists.
        self.pool
            .get_or_try_init(|| async {
                let pool = self.connect().await?;
                if let Err(e) = migrate(&pool).await {
                    pool.close().await;
                    return Err(e);
                }
                tracing::debug!(path = %self.config.path, "Local store opened");
                Ok::<_, StoreError>(pool)
            })
            .await?;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }

    async fn put(&self, collection: Collection, record: Value) -> StoreResult<()> {
        let pool = self.pool()?;
        let key = collection.record_key(&record)?;
        let entries = collection.index_entries(&record);
        let body = serde_json::to_string(&record)?;

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO records (collection, key, body) VALUES (?, ?, ?)
            ON CONFLICT(collection, key) DO UPDATE SET body = excluded.body
            "#,
        )
        .bind(collection.as_str())
        .bind(&key)
        .bind(&body)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM record_indexes WHERE collection = ? AND key = ?")
            .bind(collection.as_str())
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        for (def, token) in &entries {
            sqlx::query(
                r#"
                INSERT INTO record_indexes (collection, index_name, token, key, is_unique)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(collection.as_str())
            .bind(def.name)
            .bind(token)
            .bind(&key)
            .bind(def.unique)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    StoreError::Conflict(format!(
                        "{}.{} value is already used by another record",
                        collection, def.name
                    ))
                }
                _ => StoreError::from(e),
            })?;
        }

        // Dropping `tx` on any early return above rolls the whole put back.
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ? AND key = ?")
                .bind(collection.as_str())
                .bind(key)
                .fetch_optional(self.pool()?)
                .await?;
        body.as_deref().map(parse_body).transpose()
    }

    async fn get_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let bodies: Vec<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ? ORDER BY key")
                .bind(collection.as_str())
                .fetch_all(self.pool()?)
                .await?;
        bodies.iter().map(|b| parse_body(b)).collect()
    }

    async fn delete(&self, collection: Collection, key: &str) -> StoreResult<()> {
        let mut tx = self.pool()?.begin().await?;
        sqlx::query("DELETE FROM record_indexes WHERE collection = ? AND key = ?")
            .bind(collection.as_str())
            .bind(key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM records WHERE collection = ? AND key = ?")
            .bind(collection.as_str())
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_by_index(
        &self,
        collection: Collection,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        let pool = self.pool()?;
        let def = collection.index(index)?;
        let Some(token) = index_token(value) else {
            return Ok(Vec::new());
        };

        let bodies: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.body
            FROM record_indexes i
            JOIN records r ON r.collection = i.collection AND r.key = i.key
            WHERE i.collection = ? AND i.index_name = ? AND i.token = ?
            ORDER BY r.key
            "#,
        )
        .bind(collection.as_str())
        .bind(def.name)
        .bind(&token)
        .fetch_all(pool)
        .await?;
        bodies.iter().map(|b| parse_body(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn memory_store() -> SqliteLocalStore {
        let store = SqliteLocalStore::new(SqliteConfig::in_memory());
        store.init().await.expect("Failed to open in-memory store");
        store
    }

    fn file_config(dir: &tempfile::TempDir) -> SqliteConfig {
        SqliteConfig {
            path: dir.path().join("promptkit.db").to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_not_initialized() {
        let store = SqliteLocalStore::new(SqliteConfig::in_memory());
        assert!(!store.is_initialized());
        let result = store.get_all(Collection::Prompts).await;
        assert!(matches!(result, Err(StoreError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let store = memory_store().await;
        store
            .put(Collection::Prompts, json!({"id": "p1", "title": "kept"}))
            .await
            .expect("put");
        store.init().await.expect("second init");
        let record = store.get(Collection::Prompts, "p1").await.expect("get");
        assert_eq!(record.expect("still there")["title"], "kept");
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = memory_store().await;
        let record = json!({
            "id": "p1",
            "title": "Summarize",
            "content": "Summarize {{text}}",
            "createdAt": 1_700_000_000_000i64,
            "updatedAt": 1_700_000_000_000i64,
        });
        store
            .put(Collection::Prompts, record.clone())
            .await
            .expect("put");
        assert_eq!(
            store.get(Collection::Prompts, "p1").await.expect("get"),
            Some(record)
        );

        store.delete(Collection::Prompts, "p1").await.expect("delete");
        store
            .delete(Collection::Prompts, "p1")
            .await
            .expect("delete again");
        assert_eq!(store.get(Collection::Prompts, "p1").await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = memory_store().await;
        store
            .put(Collection::Prompts, json!({"id": "x"}))
            .await
            .expect("put prompt");
        store
            .put(Collection::Runs, json!({"id": "x", "promptId": "p"}))
            .await
            .expect("put run");
        store.delete(Collection::Prompts, "x").await.expect("delete");
        assert!(
            store
                .get(Collection::Runs, "x")
                .await
                .expect("get")
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_index_lookup_tracks_writes() {
        let store = memory_store().await;
        store
            .put(Collection::Runs, json!({"id": "r1", "promptId": "p1", "model": "gpt"}))
            .await
            .expect("put r1");
        store
            .put(Collection::Runs, json!({"id": "r2", "promptId": "p1", "model": "claude"}))
            .await
            .expect("put r2");
        store
            .put(Collection::Runs, json!({"id": "r1", "promptId": "p2", "model": "gpt"}))
            .await
            .expect("move r1");

        let p1 = store
            .get_by_index(Collection::Runs, "promptId", &json!("p1"))
            .await
            .expect("lookup p1");
        assert_eq!(p1.len(), 1);
        assert_eq!(p1[0]["id"], "r2");

        store.delete(Collection::Runs, "r2").await.expect("delete");
        let p1 = store
            .get_by_index(Collection::Runs, "promptId", &json!("p1"))
            .await
            .expect("lookup p1 after delete");
        assert!(p1.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_index_rejected() {
        let store = memory_store().await;
        let result = store
            .get_by_index(Collection::Prompts, "content", &json!("x"))
            .await;
        assert!(matches!(result, Err(StoreError::UnknownIndex { .. })));
    }

    #[tokio::test]
    async fn test_unique_conflict_rolls_back() {
        let store = memory_store().await;
        store
            .put(
                Collection::ShareLinks,
                json!({"id": "s1", "promptId": "p1", "token": "tok"}),
            )
            .await
            .expect("first");

        let result = store
            .put(
                Collection::ShareLinks,
                json!({"id": "s2", "promptId": "p2", "token": "tok"}),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(
            store
                .get(Collection::ShareLinks, "s2")
                .await
                .expect("get")
                .is_none()
        );
        let found = store
            .get_one_by_index(Collection::ShareLinks, "token", &json!("tok"))
            .await
            .expect("lookup")
            .expect("holder");
        assert_eq!(found["id"], "s1");
    }

    #[tokio::test]
    async fn test_invalid_record_rejected() {
        let store = memory_store().await;
        let result = store.put(Collection::Prompts, json!({"title": "no id"})).await;
        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
    }

    #[tokio::test]
    async fn test_reopen_preserves_data() {
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let store = SqliteLocalStore::new(file_config(&dir));
            store.init().await.expect("first open");
            store
                .put(Collection::Settings, json!({"key": "theme", "value": "dark"}))
                .await
                .expect("put");
            store.pool().expect("pool").close().await;
        }

        let store = SqliteLocalStore::new(file_config(&dir));
        store.init().await.expect("reopen");
        let setting = store
            .get(Collection::Settings, "theme")
            .await
            .expect("get")
            .expect("survived reopen");
        assert_eq!(setting["value"], "dark");
    }

    #[tokio::test]
    async fn test_failed_migration_leaves_store_uninitialized() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = SqliteLocalStore::new(file_config(&dir));
            store.init().await.expect("first open");
            let pool = store.pool().expect("pool");
            sqlx::query("UPDATE _sqlx_migrations SET checksum = X'00'")
                .execute(pool)
                .await
                .expect("tamper checksum");
            pool.close().await;
        }

        let store = SqliteLocalStore::new(file_config(&dir));
        let result = store.init().await;
        assert!(matches!(result, Err(StoreError::Migration(_))));
        assert!(!store.is_initialized());

        let put = store.put(Collection::Prompts, json!({"id": "p1"})).await;
        assert!(matches!(put, Err(StoreError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_newer_schema_version_is_left_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteLocalStore::new(file_config(&dir));
        store.init().await.expect("open");
        store
            .put(Collection::Prompts, json!({"id": "p1"}))
            .await
            .expect("put");
        sqlx::query("UPDATE store_meta SET value = '99' WHERE key = 'schema_version'")
            .execute(store.pool().expect("pool"))
            .await
            .expect("bump version");
        store.pool().expect("pool").close().await;

        let store = SqliteLocalStore::new(file_config(&dir));
        store.init().await.expect("reopen");
        let version: String =
            sqlx::query_scalar("SELECT value FROM store_meta WHERE key = 'schema_version'")
                .fetch_one(store.pool().expect("pool"))
                .await
                .expect("version");
        assert_eq!(version, "99");
        assert!(
            store
                .get(Collection::Prompts, "p1")
                .await
                .expect("get")
                .is_some()
        );
    }
}
