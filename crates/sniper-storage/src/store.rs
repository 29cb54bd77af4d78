//! SQLite-backed persistent state: subscribers, filters, the delivery
//! ledger, quota counters and the TTL cache. The store owns its schema and
//! bootstraps it on connect.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("invalid stored value: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SniperStore {
    pool: SqlitePool,
}

impl SniperStore {
    /// Opens (creating if missing) the database at `url` and bootstraps the
    /// schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Single-connection in-memory store for tests.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS subscriber (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL UNIQUE,
                tier TEXT NOT NULL DEFAULT 'trial',
                quiet_start TEXT,
                quiet_end TEXT,
                tz TEXT NOT NULL DEFAULT 'Europe/Moscow',
                delivery_blocked INTEGER NOT NULL DEFAULT 0,
                data TEXT NOT NULL DEFAULT '{}'
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS filter (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subscriber_id INTEGER NOT NULL REFERENCES subscriber(id),
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                deleted_at TEXT,
                keywords TEXT NOT NULL DEFAULT '[]',
                exclude_keywords TEXT NOT NULL DEFAULT '[]',
                primary_keywords TEXT NOT NULL DEFAULT '[]',
                secondary_keywords TEXT NOT NULL DEFAULT '[]',
                regions TEXT NOT NULL DEFAULT '[]',
                price_min REAL,
                price_max REAL,
                tender_types TEXT NOT NULL DEFAULT '[]',
                law_type TEXT NOT NULL DEFAULT 'any',
                ai_intent TEXT,
                ai_intent_version INTEGER NOT NULL DEFAULT 0,
                expanded_keywords TEXT NOT NULL DEFAULT '[]',
                min_deadline_days INTEGER NOT NULL DEFAULT 0,
                notify_chat_ids TEXT NOT NULL DEFAULT '[]'
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS delivery (
                subscriber_id INTEGER NOT NULL,
                filter_id INTEGER NOT NULL,
                tender_number TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'tentative',
                reserved_at TEXT NOT NULL,
                sent_at TEXT,
                PRIMARY KEY (subscriber_id, filter_id, tender_number)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                PRIMARY KEY (kind, key)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS quota (
                subscriber_id INTEGER NOT NULL,
                resource TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                reset_on TEXT NOT NULL,
                PRIMARY KEY (subscriber_id, resource)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                subscriber_id INTEGER NOT NULL,
                tender_number TEXT NOT NULL,
                filter_id INTEGER,
                action TEXT NOT NULL,
                at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_filter_subscriber_active ON filter(subscriber_id, is_active)",
            "CREATE INDEX IF NOT EXISTS idx_delivery_state ON delivery(state, reserved_at)",
            "CREATE INDEX IF NOT EXISTS idx_cache_expiry ON cache(expires_at)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

pub(crate) fn json_list(raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw)
        .map_err(|err| StoreError::Corrupt(format!("json list {raw:?}: {err}")))
}

pub(crate) fn json_i64_list(raw: &str) -> Result<Vec<i64>, StoreError> {
    serde_json::from_str(raw)
        .map_err(|err| StoreError::Corrupt(format!("json list {raw:?}: {err}")))
}
