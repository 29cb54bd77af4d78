//! Delivery ledger: the at-most-once machinery. One row per
//! (subscriber, filter, tender), inserted tentatively before the send and
//! either confirmed or discarded afterwards. The primary key makes the
//! reservation race-free under concurrent cycles.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use crate::store::{SniperStore, StoreError};

/// Handle for a tentative ledger row. Every reservation must end in
/// `confirm` or `abandon`; the expiry sweep reclaims rows left behind by a
/// crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub subscriber_id: i64,
    pub filter_id: i64,
    pub tender_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved(Reservation),
    AlreadyDelivered,
}

/// Why a reservation was released without a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonCause {
    QuietHours,
    QuotaExhausted,
    SinkTransient,
    SinkPermanent,
    Draining,
}

impl AbandonCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuietHours => "quiet",
            Self::QuotaExhausted => "quota",
            Self::SinkTransient => "transient",
            Self::SinkPermanent => "blocked",
            Self::Draining => "draining",
        }
    }
}

impl SniperStore {
    /// Atomically claims the (subscriber, filter, tender) triple. A blocked
    /// subscriber or an existing row, tentative or confirmed, yields
    /// `AlreadyDelivered`; the duplicate insert is the normal at-most-once
    /// signal, not an error.
    pub async fn reserve(
        &self,
        subscriber_id: i64,
        filter_id: i64,
        tender_number: &str,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, StoreError> {
        if self.is_blocked(subscriber_id).await? {
            return Ok(ReserveOutcome::AlreadyDelivered);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO delivery (subscriber_id, filter_id, tender_number, state, reserved_at)
            VALUES (?, ?, ?, 'tentative', ?)
            ON CONFLICT(subscriber_id, filter_id, tender_number) DO NOTHING
            "#,
        )
        .bind(subscriber_id)
        .bind(filter_id)
        .bind(tender_number)
        .bind(now)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 1 {
            Ok(ReserveOutcome::Reserved(Reservation {
                subscriber_id,
                filter_id,
                tender_number: tender_number.to_string(),
            }))
        } else {
            Ok(ReserveOutcome::AlreadyDelivered)
        }
    }

    /// Marks the reservation delivered. Idempotent per reservation: only a
    /// tentative row transitions.
    pub async fn confirm(
        &self,
        reservation: &Reservation,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE delivery SET state = 'confirmed', sent_at = ?
            WHERE subscriber_id = ? AND filter_id = ? AND tender_number = ?
              AND state = 'tentative'
            "#,
        )
        .bind(sent_at)
        .bind(reservation.subscriber_id)
        .bind(reservation.filter_id)
        .bind(&reservation.tender_number)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Discards the tentative row so a later cycle may retry the tender.
    pub async fn abandon(
        &self,
        reservation: &Reservation,
        cause: AbandonCause,
    ) -> Result<(), StoreError> {
        debug!(
            subscriber = reservation.subscriber_id,
            filter = reservation.filter_id,
            tender = %reservation.tender_number,
            cause = cause.as_str(),
            "reservation abandoned"
        );
        sqlx::query(
            r#"
            DELETE FROM delivery
            WHERE subscriber_id = ? AND filter_id = ? AND tender_number = ?
              AND state = 'tentative'
            "#,
        )
        .bind(reservation.subscriber_id)
        .bind(reservation.filter_id)
        .bind(&reservation.tender_number)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Reclaims tentative rows older than `cutoff`, the leftovers of a
    /// crash strictly before the send. Returns how many were released.
    pub async fn expire_tentative(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM delivery WHERE state = 'tentative' AND reserved_at < ?")
                .bind(cutoff)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn confirmed_count(&self, subscriber_id: i64) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM delivery WHERE subscriber_id = ? AND state = 'confirmed'",
        )
        .bind(subscriber_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Records an opaque action callback from the front-end.
    pub async fn record_feedback(
        &self,
        subscriber_id: i64,
        tender_number: &str,
        filter_id: Option<i64>,
        action: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO feedback (subscriber_id, tender_number, filter_id, action, at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(subscriber_id)
        .bind(tender_number)
        .bind(filter_id)
        .bind(action)
        .bind(at)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sniper_core::Tier;

    async fn store_with_subscriber() -> (SniperStore, i64) {
        let store = SniperStore::connect_in_memory().await.unwrap();
        let id = store
            .upsert_subscriber(100, Tier::Basic, None, "Europe/Moscow")
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn second_reserve_returns_already_delivered() {
        let (store, sub) = store_with_subscriber().await;
        let now = Utc::now();

        let first = store.reserve(sub, 1, "0372-1", now).await.unwrap();
        let ReserveOutcome::Reserved(reservation) = first else {
            panic!("expected a fresh reservation");
        };

        // Tentative rows already dedup.
        assert_eq!(
            store.reserve(sub, 1, "0372-1", now).await.unwrap(),
            ReserveOutcome::AlreadyDelivered
        );

        store.confirm(&reservation, now).await.unwrap();
        assert_eq!(
            store.reserve(sub, 1, "0372-1", now).await.unwrap(),
            ReserveOutcome::AlreadyDelivered
        );
        assert_eq!(store.confirmed_count(sub).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn abandon_frees_the_triple_for_retry() {
        let (store, sub) = store_with_subscriber().await;
        let now = Utc::now();

        let ReserveOutcome::Reserved(reservation) =
            store.reserve(sub, 1, "0372-1", now).await.unwrap()
        else {
            panic!("expected a fresh reservation");
        };
        store
            .abandon(&reservation, AbandonCause::SinkTransient)
            .await
            .unwrap();

        assert!(matches!(
            store.reserve(sub, 1, "0372-1", now).await.unwrap(),
            ReserveOutcome::Reserved(_)
        ));
    }

    #[tokio::test]
    async fn abandon_never_touches_confirmed_rows() {
        let (store, sub) = store_with_subscriber().await;
        let now = Utc::now();

        let ReserveOutcome::Reserved(reservation) =
            store.reserve(sub, 1, "0372-1", now).await.unwrap()
        else {
            panic!("expected a fresh reservation");
        };
        store.confirm(&reservation, now).await.unwrap();
        store
            .abandon(&reservation, AbandonCause::Draining)
            .await
            .unwrap();

        assert_eq!(
            store.reserve(sub, 1, "0372-1", now).await.unwrap(),
            ReserveOutcome::AlreadyDelivered
        );
    }

    #[tokio::test]
    async fn blocked_subscriber_cannot_reserve() {
        let (store, sub) = store_with_subscriber().await;
        store.mark_blocked(sub).await.unwrap();
        assert_eq!(
            store.reserve(sub, 1, "0372-1", Utc::now()).await.unwrap(),
            ReserveOutcome::AlreadyDelivered
        );
    }

    #[tokio::test]
    async fn expiry_sweep_releases_stale_tentative_rows() {
        let (store, sub) = store_with_subscriber().await;
        let now = Utc::now();
        let stale = now - chrono::Duration::minutes(20);

        store.reserve(sub, 1, "0372-1", stale).await.unwrap();
        let ReserveOutcome::Reserved(fresh) = store.reserve(sub, 1, "0372-2", now).await.unwrap()
        else {
            panic!("expected a fresh reservation");
        };
        store.confirm(&fresh, now).await.unwrap();

        let swept = store
            .expire_tentative(now - chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(swept, 1);

        // The stale tender is reservable again; the confirmed one is not.
        assert!(matches!(
            store.reserve(sub, 1, "0372-1", now).await.unwrap(),
            ReserveOutcome::Reserved(_)
        ));
        assert_eq!(
            store.reserve(sub, 1, "0372-2", now).await.unwrap(),
            ReserveOutcome::AlreadyDelivered
        );
    }
}
