//! Background maintenance: cache sweeping, stale-reservation expiry and
//! hard-expiry of soft-deleted filters. Runs on a cron scheduler beside
//! the engine so a wedged cycle cannot starve cleanup.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use sniper_storage::SniperStore;

/// Soft-deleted filters stay restorable this long.
const DELETED_FILTER_RETENTION_DAYS: i64 = 30;

pub async fn build_scheduler(
    store: SniperStore,
    poll_interval: Duration,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Expired cache entries, hourly.
    let cache_store = store.clone();
    scheduler
        .add(Job::new_async("0 17 * * * *", move |_id, _lock| {
            let store = cache_store.clone();
            Box::pin(async move {
                match store.cache_sweep(Utc::now()).await {
                    Ok(swept) if swept > 0 => info!(swept, "cache sweep"),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "cache sweep failed"),
                }
            })
        })?)
        .await?;

    // Tentative reservations stranded by a crash, every five minutes.
    let ledger_store = store.clone();
    let interval = ChronoDuration::from_std(poll_interval).unwrap_or(ChronoDuration::seconds(300));
    scheduler
        .add(Job::new_async("30 */5 * * * *", move |_id, _lock| {
            let store = ledger_store.clone();
            Box::pin(async move {
                match store.expire_tentative(Utc::now() - interval).await {
                    Ok(expired) if expired > 0 => info!(expired, "stale reservations released"),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "reservation expiry failed"),
                }
            })
        })?)
        .await?;

    // Hard-expire soft-deleted filters, daily.
    scheduler
        .add(Job::new_async("0 41 3 * * *", move |_id, _lock| {
            let store = store.clone();
            Box::pin(async move {
                let cutoff = Utc::now() - ChronoDuration::days(DELETED_FILTER_RETENTION_DAYS);
                match store.purge_deleted_filters(cutoff).await {
                    Ok(purged) if purged > 0 => info!(purged, "soft-deleted filters purged"),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "filter purge failed"),
                }
            })
        })?)
        .await?;

    Ok(scheduler)
}
