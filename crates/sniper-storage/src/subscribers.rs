//! Subscriber repository. Quiet hours and the timezone live in typed
//! columns; the `data` pouch only carries flags migrated from the legacy
//! schema.

use chrono::NaiveTime;
use sqlx::Row;
use tracing::warn;

use sniper_core::{QuietHours, Subscriber, Tier};

use crate::store::{SniperStore, StoreError};

const QUIET_FORMAT: &str = "%H:%M";

impl SniperStore {
    /// Creates the subscriber or refreshes tier/quiet-hours/zone. Returns
    /// the row id.
    pub async fn upsert_subscriber(
        &self,
        chat_id: i64,
        tier: Tier,
        quiet_hours: Option<QuietHours>,
        tz: &str,
    ) -> Result<i64, StoreError> {
        let (quiet_start, quiet_end) = match quiet_hours {
            Some(window) => (
                Some(window.start.format(QUIET_FORMAT).to_string()),
                Some(window.end.format(QUIET_FORMAT).to_string()),
            ),
            None => (None, None),
        };
        let row = sqlx::query(
            r#"
            INSERT INTO subscriber (chat_id, tier, quiet_start, quiet_end, tz)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(chat_id) DO UPDATE SET
                tier = excluded.tier,
                quiet_start = excluded.quiet_start,
                quiet_end = excluded.quiet_end,
                tz = excluded.tz
            RETURNING id
            "#,
        )
        .bind(chat_id)
        .bind(tier.as_str())
        .bind(quiet_start)
        .bind(quiet_end)
        .bind(tz)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get::<i64, _>("id"))
    }

    pub async fn subscriber(&self, id: i64) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query("SELECT * FROM subscriber WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| subscriber_from_row(&r)).transpose()
    }

    pub async fn subscriber_by_chat(&self, chat_id: i64) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query("SELECT * FROM subscriber WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| subscriber_from_row(&r)).transpose()
    }

    /// Flags the subscriber as unreachable. While set, reservations come
    /// back `AlreadyDelivered` and the subscriber's filters are skipped.
    pub async fn mark_blocked(&self, subscriber_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE subscriber SET delivery_blocked = 1 WHERE id = ?")
            .bind(subscriber_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Any inbound interaction proves the recipient is reachable again.
    pub async fn record_liveness(&self, chat_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE subscriber SET delivery_blocked = 0 WHERE chat_id = ?")
            .bind(chat_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn is_blocked(&self, subscriber_id: i64) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT delivery_blocked FROM subscriber WHERE id = ?")
            .bind(subscriber_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row
            .map(|r| r.get::<i64, _>("delivery_blocked") != 0)
            .unwrap_or(false))
    }
}

pub(crate) fn subscriber_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Subscriber, StoreError> {
    let tz_name: String = row.get("tz");
    let tz = tz_name.parse().unwrap_or_else(|_| {
        warn!(tz = %tz_name, "unknown IANA zone on subscriber, falling back to Europe/Moscow");
        chrono_tz::Europe::Moscow
    });

    let quiet_hours = match (
        row.get::<Option<String>, _>("quiet_start"),
        row.get::<Option<String>, _>("quiet_end"),
    ) {
        (Some(start), Some(end)) => {
            let start = NaiveTime::parse_from_str(&start, QUIET_FORMAT)
                .map_err(|err| StoreError::Corrupt(format!("quiet_start {start:?}: {err}")))?;
            let end = NaiveTime::parse_from_str(&end, QUIET_FORMAT)
                .map_err(|err| StoreError::Corrupt(format!("quiet_end {end:?}: {err}")))?;
            Some(QuietHours { start, end })
        }
        _ => None,
    };

    let data: String = row.get("data");

    Ok(Subscriber {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        tier: Tier::from_db(row.get::<String, _>("tier").as_str()),
        quiet_hours,
        tz,
        delivery_blocked: row.get::<i64, _>("delivery_blocked") != 0,
        data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
    })
}
