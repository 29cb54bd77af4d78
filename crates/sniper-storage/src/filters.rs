//! Filter repository. The pipeline only ever reads through
//! `active_filters`; writes come from the front-end.

use chrono::{DateTime, Utc};
use sqlx::Row;

use sniper_core::{LawType, Subscriber, TenderFilter, TenderType};

use crate::store::{json_i64_list, json_list, SniperStore, StoreError};
use crate::subscribers::subscriber_from_row;

/// Fields that participate in matching. Editing any of them invalidates
/// cached oracle confidences, so the intent version is bumped.
fn matching_inputs_changed(existing: &TenderFilter, updated: &TenderFilter) -> bool {
    existing.keywords != updated.keywords
        || existing.exclude_keywords != updated.exclude_keywords
        || existing.primary_keywords != updated.primary_keywords
        || existing.secondary_keywords != updated.secondary_keywords
        || existing.regions != updated.regions
        || existing.price_min != updated.price_min
        || existing.price_max != updated.price_max
        || existing.tender_types != updated.tender_types
}

impl SniperStore {
    /// Inserts a validated filter and returns its id.
    pub async fn create_filter(&self, filter: &TenderFilter) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO filter (
                subscriber_id, name, is_active, deleted_at,
                keywords, exclude_keywords, primary_keywords, secondary_keywords,
                regions, price_min, price_max, tender_types, law_type,
                ai_intent, ai_intent_version, expanded_keywords,
                min_deadline_days, notify_chat_ids
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(filter.subscriber_id)
        .bind(&filter.name)
        .bind(filter.is_active)
        .bind(filter.deleted_at)
        .bind(serde_json::to_string(&filter.keywords)?)
        .bind(serde_json::to_string(&filter.exclude_keywords)?)
        .bind(serde_json::to_string(&filter.primary_keywords)?)
        .bind(serde_json::to_string(&filter.secondary_keywords)?)
        .bind(serde_json::to_string(&filter.regions)?)
        .bind(filter.price_min)
        .bind(filter.price_max)
        .bind(serde_json::to_string(&filter.tender_types)?)
        .bind(filter.law_type.as_str())
        .bind(&filter.ai_intent)
        .bind(filter.ai_intent_version)
        .bind(serde_json::to_string(&filter.expanded_keywords)?)
        .bind(filter.min_deadline_days)
        .bind(serde_json::to_string(&filter.notify_chat_ids)?)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get::<i64, _>("id"))
    }

    /// Rewrites a filter. When any matching input changed, the intent
    /// version is bumped so stale oracle confidences stop matching their
    /// cache key.
    pub async fn update_filter(&self, filter: &TenderFilter) -> Result<(), StoreError> {
        let existing = self
            .filter_by_id(filter.id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("filter {} not found", filter.id)))?;

        let next_version = if matching_inputs_changed(&existing, filter) {
            existing.ai_intent_version + 1
        } else {
            existing.ai_intent_version
        };

        sqlx::query(
            r#"
            UPDATE filter SET
                name = ?, is_active = ?,
                keywords = ?, exclude_keywords = ?, primary_keywords = ?,
                secondary_keywords = ?, regions = ?, price_min = ?, price_max = ?,
                tender_types = ?, law_type = ?, ai_intent = ?, ai_intent_version = ?,
                expanded_keywords = ?, min_deadline_days = ?, notify_chat_ids = ?
            WHERE id = ?
            "#,
        )
        .bind(&filter.name)
        .bind(filter.is_active)
        .bind(serde_json::to_string(&filter.keywords)?)
        .bind(serde_json::to_string(&filter.exclude_keywords)?)
        .bind(serde_json::to_string(&filter.primary_keywords)?)
        .bind(serde_json::to_string(&filter.secondary_keywords)?)
        .bind(serde_json::to_string(&filter.regions)?)
        .bind(filter.price_min)
        .bind(filter.price_max)
        .bind(serde_json::to_string(&filter.tender_types)?)
        .bind(filter.law_type.as_str())
        .bind(&filter.ai_intent)
        .bind(next_version)
        .bind(serde_json::to_string(&filter.expanded_keywords)?)
        .bind(filter.min_deadline_days)
        .bind(serde_json::to_string(&filter.notify_chat_ids)?)
        .bind(filter.id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn filter_by_id(&self, id: i64) -> Result<Option<TenderFilter>, StoreError> {
        let row = sqlx::query("SELECT * FROM filter WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| filter_from_row(&r)).transpose()
    }

    /// Marks the filter soft-deleted; restorable until hard-expired.
    pub async fn soft_delete_filter(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE filter SET deleted_at = ?, is_active = 0 WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Restores a soft-deleted filter. Delivered tenders stay in the
    /// ledger, so restoration cannot re-send anything.
    pub async fn restore_filter(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE filter SET deleted_at = NULL, is_active = 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Permanently removes filters soft-deleted before `cutoff`.
    pub async fn purge_deleted_filters(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM filter WHERE deleted_at IS NOT NULL AND deleted_at < ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Everything a poll cycle consults: live filters joined with their
    /// owners, excluding blocked subscribers.
    pub async fn active_filters(&self) -> Result<Vec<(TenderFilter, Subscriber)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT f.*,
                   s.id AS s_id, s.chat_id, s.tier, s.quiet_start, s.quiet_end,
                   s.tz, s.delivery_blocked, s.data
            FROM filter f
            JOIN subscriber s ON s.id = f.subscriber_id
            WHERE f.is_active = 1
              AND f.deleted_at IS NULL
              AND s.delivery_blocked = 0
            ORDER BY s.id, f.id
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let filter = filter_from_row(&row)?;
            let mut subscriber = subscriber_from_row(&row)?;
            // The joined row aliases the subscriber id.
            subscriber.id = row.get("s_id");
            result.push((filter, subscriber));
        }
        Ok(result)
    }
}

fn filter_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TenderFilter, StoreError> {
    let tender_types: Vec<TenderType> =
        serde_json::from_str(&row.get::<String, _>("tender_types"))
            .map_err(|err| StoreError::Corrupt(format!("tender_types: {err}")))?;

    Ok(TenderFilter {
        id: row.get("id"),
        subscriber_id: row.get("subscriber_id"),
        name: row.get("name"),
        is_active: row.get::<i64, _>("is_active") != 0,
        deleted_at: row.get("deleted_at"),
        keywords: json_list(&row.get::<String, _>("keywords"))?,
        exclude_keywords: json_list(&row.get::<String, _>("exclude_keywords"))?,
        primary_keywords: json_list(&row.get::<String, _>("primary_keywords"))?,
        secondary_keywords: json_list(&row.get::<String, _>("secondary_keywords"))?,
        regions: json_list(&row.get::<String, _>("regions"))?,
        price_min: row.get("price_min"),
        price_max: row.get("price_max"),
        tender_types,
        law_type: LawType::from_db(row.get::<String, _>("law_type").as_str()),
        ai_intent: row.get("ai_intent"),
        ai_intent_version: row.get("ai_intent_version"),
        expanded_keywords: json_list(&row.get::<String, _>("expanded_keywords"))?,
        min_deadline_days: row.get("min_deadline_days"),
        notify_chat_ids: json_i64_list(&row.get::<String, _>("notify_chat_ids"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sniper_core::Tier;

    fn sample_filter(subscriber_id: i64) -> TenderFilter {
        TenderFilter {
            id: 0,
            subscriber_id,
            name: "ИТ оборудование".into(),
            is_active: true,
            deleted_at: None,
            keywords: vec!["ноутбук".into()],
            exclude_keywords: vec!["б/у".into()],
            primary_keywords: vec![],
            secondary_keywords: vec![],
            regions: vec!["Москва".into()],
            price_min: Some(500_000.0),
            price_max: Some(2_000_000.0),
            tender_types: vec![TenderType::Goods],
            law_type: LawType::Fz44,
            ai_intent: Some("Закупки ноутбуков".into()),
            ai_intent_version: 0,
            expanded_keywords: vec![],
            min_deadline_days: 5,
            notify_chat_ids: vec![],
        }
    }

    async fn store_with_subscriber() -> (SniperStore, i64) {
        let store = SniperStore::connect_in_memory().await.unwrap();
        let subscriber_id = store
            .upsert_subscriber(100, Tier::Basic, None, "Europe/Moscow")
            .await
            .unwrap();
        (store, subscriber_id)
    }

    #[tokio::test]
    async fn create_and_load_round_trip() {
        let (store, subscriber_id) = store_with_subscriber().await;
        let id = store.create_filter(&sample_filter(subscriber_id)).await.unwrap();

        let loaded = store.filter_by_id(id).await.unwrap().unwrap();
        assert_eq!(loaded.keywords, vec!["ноутбук"]);
        assert_eq!(loaded.regions, vec!["Москва"]);
        assert_eq!(loaded.law_type, LawType::Fz44);
        assert_eq!(loaded.tender_types, vec![TenderType::Goods]);
        assert_eq!(loaded.min_deadline_days, 5);
    }

    #[tokio::test]
    async fn matching_input_edits_bump_intent_version() {
        let (store, subscriber_id) = store_with_subscriber().await;
        let id = store.create_filter(&sample_filter(subscriber_id)).await.unwrap();

        // Renaming alone keeps the version.
        let mut filter = store.filter_by_id(id).await.unwrap().unwrap();
        filter.name = "Ноутбуки и ПК".into();
        store.update_filter(&filter).await.unwrap();
        assert_eq!(store.filter_by_id(id).await.unwrap().unwrap().ai_intent_version, 0);

        // Touching keywords bumps it.
        let mut filter = store.filter_by_id(id).await.unwrap().unwrap();
        filter.keywords.push("моноблок".into());
        store.update_filter(&filter).await.unwrap();
        assert_eq!(store.filter_by_id(id).await.unwrap().unwrap().ai_intent_version, 1);

        // So does the price band.
        let mut filter = store.filter_by_id(id).await.unwrap().unwrap();
        filter.price_max = Some(3_000_000.0);
        store.update_filter(&filter).await.unwrap();
        assert_eq!(store.filter_by_id(id).await.unwrap().unwrap().ai_intent_version, 2);
    }

    #[tokio::test]
    async fn soft_deleted_filters_leave_the_active_set_and_come_back() {
        let (store, subscriber_id) = store_with_subscriber().await;
        let id = store.create_filter(&sample_filter(subscriber_id)).await.unwrap();
        assert_eq!(store.active_filters().await.unwrap().len(), 1);

        store.soft_delete_filter(id, Utc::now()).await.unwrap();
        assert!(store.active_filters().await.unwrap().is_empty());

        store.restore_filter(id).await.unwrap();
        assert_eq!(store.active_filters().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blocked_subscribers_are_excluded_from_the_active_set() {
        let (store, subscriber_id) = store_with_subscriber().await;
        store.create_filter(&sample_filter(subscriber_id)).await.unwrap();
        assert_eq!(store.active_filters().await.unwrap().len(), 1);

        store.mark_blocked(subscriber_id).await.unwrap();
        assert!(store.active_filters().await.unwrap().is_empty());

        store.record_liveness(100).await.unwrap();
        assert_eq!(store.active_filters().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_removes_only_expired_soft_deletes() {
        let (store, subscriber_id) = store_with_subscriber().await;
        let id = store.create_filter(&sample_filter(subscriber_id)).await.unwrap();
        let now = Utc::now();
        store.soft_delete_filter(id, now - chrono::Duration::days(40)).await.unwrap();

        let purged = store
            .purge_deleted_filters(now - chrono::Duration::days(30))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.filter_by_id(id).await.unwrap().is_none());
    }
}
