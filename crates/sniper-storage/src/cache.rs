//! Persistent keyed cache with per-kind TTLs. Backs detail-page enrichment
//! and oracle confidences so process restarts do not void either; a sweep
//! removes expired rows in the background.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::store::{SniperStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Enrichment,
    Oracle,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrichment => "enrichment",
            Self::Oracle => "oracle",
        }
    }

    pub fn default_ttl(&self) -> Duration {
        match self {
            Self::Enrichment => Duration::from_secs(7 * 24 * 3600),
            Self::Oracle => Duration::from_secs(24 * 3600),
        }
    }
}

impl SniperStore {
    /// Fetches a live entry; absent or expired yields `None`.
    pub async fn cache_get(
        &self,
        kind: CacheKind,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let row = sqlx::query(
            "SELECT value FROM cache WHERE kind = ? AND key = ? AND expires_at > ?",
        )
        .bind(kind.as_str())
        .bind(key)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// Upserts an entry with the given TTL. Last write wins.
    pub async fn cache_put(
        &self,
        kind: CacheKind,
        key: &str,
        value: &serde_json::Value,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::days(1));
        sqlx::query(
            r#"
            INSERT INTO cache (kind, key, value, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(kind, key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(kind.as_str())
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .bind(expires_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Removes expired entries of every kind. Returns how many went.
    pub async fn cache_sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cache WHERE expires_at <= ?")
            .bind(now)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
