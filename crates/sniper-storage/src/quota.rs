//! Per-subscriber daily counters for notifications and oracle calls.
//! Counters are monotonic within a local day and reset exactly once at the
//! day boundary in the subscriber's zone. The check-and-increment runs in a
//! transaction and never spans an external call.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use sniper_core::Subscriber;

use crate::store::{SniperStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaResource {
    Notifications,
    OracleCalls,
}

impl QuotaResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::OracleCalls => "oracle_calls",
        }
    }

    fn cap(&self, subscriber: &Subscriber) -> i64 {
        match self {
            Self::Notifications => subscriber.tier.notifications_per_day(),
            Self::OracleCalls => subscriber.tier.oracle_calls_per_day(),
        }
    }
}

impl SniperStore {
    /// Consumes `n` units iff the resulting count stays within the tier
    /// cap for the subscriber's current local day.
    pub async fn try_consume(
        &self,
        subscriber: &Subscriber,
        resource: QuotaResource,
        n: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let local_date = subscriber.local_date(now);
        let cap = resource.cap(subscriber);

        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            "SELECT count, reset_on FROM quota WHERE subscriber_id = ? AND resource = ?",
        )
        .bind(subscriber.id)
        .bind(resource.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let current = match row {
            Some(row) => {
                let reset_on: NaiveDate = row.get("reset_on");
                if reset_on < local_date {
                    0
                } else {
                    row.get::<i64, _>("count")
                }
            }
            None => 0,
        };

        if current + n > cap {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO quota (subscriber_id, resource, count, reset_on)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(subscriber_id, resource) DO UPDATE SET
                count = excluded.count,
                reset_on = excluded.reset_on
            "#,
        )
        .bind(subscriber.id)
        .bind(resource.as_str())
        .bind(current + n)
        .bind(local_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Returns `n` units consumed earlier in the same local day. Used when
    /// a pre-authorised send fails: the quota is charged only on successful
    /// delivery, but authorisation must precede the sink call so the cap is
    /// never overshot.
    pub async fn refund(
        &self,
        subscriber: &Subscriber,
        resource: QuotaResource,
        n: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let local_date = subscriber.local_date(now);
        sqlx::query(
            r#"
            UPDATE quota SET count = MAX(0, count - ?)
            WHERE subscriber_id = ? AND resource = ? AND reset_on = ?
            "#,
        )
        .bind(n)
        .bind(subscriber.id)
        .bind(resource.as_str())
        .bind(local_date)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Current (used, cap) for the subscriber's local day.
    pub async fn quota_usage(
        &self,
        subscriber: &Subscriber,
        resource: QuotaResource,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), StoreError> {
        let local_date = subscriber.local_date(now);
        let row = sqlx::query(
            "SELECT count, reset_on FROM quota WHERE subscriber_id = ? AND resource = ?",
        )
        .bind(subscriber.id)
        .bind(resource.as_str())
        .fetch_optional(self.pool())
        .await?;

        let used = match row {
            Some(row) => {
                let reset_on: NaiveDate = row.get("reset_on");
                if reset_on < local_date {
                    0
                } else {
                    row.get::<i64, _>("count")
                }
            }
            None => 0,
        };
        Ok((used, resource.cap(subscriber)))
    }

    /// Test/maintenance hook: rewinds the reset marker so the next consume
    /// observes a day boundary.
    pub async fn backdate_quota(
        &self,
        subscriber_id: i64,
        resource: QuotaResource,
        reset_on: NaiveDate,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE quota SET reset_on = ? WHERE subscriber_id = ? AND resource = ?")
            .bind(reset_on)
            .bind(subscriber_id)
            .bind(resource.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
