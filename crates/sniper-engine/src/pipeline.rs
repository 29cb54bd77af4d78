//! The poll-cycle orchestrator. A single control task runs the cycle
//! clock; inside a cycle, filters fan out onto a bounded task set and each
//! tender walks the cascade: pre-score, enrich, full score, oracle,
//! reserve, send, confirm. All shared mutable state lives in the store;
//! no in-memory lock is held across an await of an external call.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use sniper_adapters::{FeedQuery, FeedSource, NotificationSink, RelevanceOracle, SendOutcome};
use sniper_core::{EnrichedTender, OracleAssessment, Subscriber, TenderFilter};
use sniper_match::SmartMatcher;
use sniper_storage::{AbandonCause, QuotaResource, Reservation, ReserveOutcome, SniperStore, StoreError};

use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Polling,
    Draining,
    /// Terminal. Entered on stop() or on loss of the persistent backend;
    /// no further notifications are emitted.
    Stopping,
}

/// Counters for one poll cycle, aggregated across filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleSummary {
    pub filters_processed: usize,
    pub feed_errors: usize,
    pub candidates_seen: usize,
    pub archived_dropped: usize,
    pub pre_score_dropped: usize,
    pub enriched: usize,
    pub full_score_dropped: usize,
    pub oracle_consulted: usize,
    pub below_notify_threshold: usize,
    pub already_delivered: usize,
    pub quiet_deferred: usize,
    pub quota_skipped: usize,
    pub sent: usize,
    pub sink_transient: usize,
    pub sink_permanent: usize,
    pub reservations_expired: u64,
}

impl CycleSummary {
    fn absorb(&mut self, other: CycleSummary) {
        self.filters_processed += other.filters_processed;
        self.feed_errors += other.feed_errors;
        self.candidates_seen += other.candidates_seen;
        self.archived_dropped += other.archived_dropped;
        self.pre_score_dropped += other.pre_score_dropped;
        self.enriched += other.enriched;
        self.full_score_dropped += other.full_score_dropped;
        self.oracle_consulted += other.oracle_consulted;
        self.below_notify_threshold += other.below_notify_threshold;
        self.already_delivered += other.already_delivered;
        self.quiet_deferred += other.quiet_deferred;
        self.quota_skipped += other.quota_skipped;
        self.sent += other.sent;
        self.sink_transient += other.sink_transient;
        self.sink_permanent += other.sink_permanent;
    }
}

enum DeliveryDisposition {
    Sent,
    QuietDeferred,
    QuotaSkipped,
    Transient,
    Permanent,
}

struct DeliveryOutcome {
    disposition: DeliveryDisposition,
    /// A sink-permanent failure occurred on at least one target chat and
    /// the subscriber is now delivery-blocked. Independent of the
    /// disposition: with group routing one chat can take the message while
    /// another reports the recipient gone.
    recipient_blocked: bool,
}

#[derive(Clone)]
pub struct PipelineEngine {
    store: SniperStore,
    feed: Arc<dyn FeedSource>,
    oracle: Arc<dyn RelevanceOracle>,
    sink: Arc<dyn NotificationSink>,
    matcher: Arc<SmartMatcher>,
    config: EngineConfig,
    state: Arc<Mutex<EngineState>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    enrich_global: Arc<Semaphore>,
}

impl PipelineEngine {
    pub fn new(
        store: SniperStore,
        feed: Arc<dyn FeedSource>,
        oracle: Arc<dyn RelevanceOracle>,
        sink: Arc<dyn NotificationSink>,
        matcher: SmartMatcher,
        config: EngineConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let enrich_global = Arc::new(Semaphore::new(config.enrich_global.max(1)));
        Self {
            store,
            feed,
            oracle,
            sink,
            matcher: Arc::new(matcher),
            config,
            state: Arc::new(Mutex::new(EngineState::Idle)),
            shutdown_tx,
            shutdown_rx,
            enrich_global,
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock().expect("state lock")
    }

    fn set_state(&self, next: EngineState) {
        let mut state = self.state.lock().expect("state lock");
        if *state != EngineState::Stopping {
            *state = next;
        }
    }

    fn is_stopping(&self) -> bool {
        self.state() == EngineState::Stopping
    }

    /// Requests a best-effort drain: in-flight reservations finish, no new
    /// ones are issued, and the run loop exits.
    pub fn stop(&self) {
        *self.state.lock().expect("state lock") = EngineState::Stopping;
        let _ = self.shutdown_tx.send(true);
    }

    /// Cycle clock. Cadence is measured from cycle end to next cycle
    /// start, so cycles never overlap.
    pub async fn run(&self) -> anyhow::Result<()> {
        loop {
            if self.is_stopping() {
                return Ok(());
            }
            if let Err(err) = self.run_cycle().await {
                *self.state.lock().expect("state lock") = EngineState::Stopping;
                error!(error = %err, "persistent backend failure, engine stopping");
                return Err(err);
            }

            let mut shutdown = self.shutdown_rx.clone();
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    pub async fn run_cycle(&self) -> anyhow::Result<CycleSummary> {
        let run_id = Uuid::new_v4();
        let started = Utc::now();
        self.set_state(EngineState::Polling);

        let pairs = self
            .store
            .active_filters()
            .await
            .context("loading active filters")?;

        let mut summary = CycleSummary::default();
        let filter_limit = Arc::new(Semaphore::new(self.config.filter_concurrency.max(1)));
        let mut tasks: JoinSet<Result<CycleSummary, StoreError>> = JoinSet::new();

        for (filter, subscriber) in pairs {
            if let Err(err) = filter.validate() {
                warn!(filter = filter.id, error = %err, "filter skipped by validation");
                continue;
            }
            summary.filters_processed += 1;

            let engine = self.clone();
            let permit_source = filter_limit.clone();
            tasks.spawn(async move {
                let _permit = permit_source.acquire_owned().await.expect("semaphore open");
                engine.process_filter(run_id, filter, subscriber).await
            });
        }

        self.set_state(EngineState::Draining);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(stats)) => summary.absorb(stats),
                Ok(Err(err)) => {
                    return Err(anyhow::Error::new(err).context("filter processing lost the store"));
                }
                Err(join_err) => {
                    error!(error = %join_err, "filter task panicked");
                }
            }
        }

        // Reclaim reservations stranded by a crash strictly before send.
        let expiry_cutoff = Utc::now()
            - ChronoDuration::from_std(self.config.poll_interval)
                .unwrap_or_else(|_| ChronoDuration::seconds(300));
        summary.reservations_expired = self
            .store
            .expire_tentative(expiry_cutoff)
            .await
            .context("expiring tentative reservations")?;

        self.set_state(EngineState::Idle);
        info!(
            %run_id,
            elapsed_ms = (Utc::now() - started).num_milliseconds(),
            filters = summary.filters_processed,
            candidates = summary.candidates_seen,
            enriched = summary.enriched,
            oracle = summary.oracle_consulted,
            sent = summary.sent,
            deduped = summary.already_delivered,
            quiet = summary.quiet_deferred,
            quota = summary.quota_skipped,
            "cycle complete"
        );
        Ok(summary)
    }

    async fn process_filter(
        &self,
        run_id: Uuid,
        filter: TenderFilter,
        subscriber: Subscriber,
    ) -> Result<CycleSummary, StoreError> {
        let mut stats = CycleSummary::default();

        let query = FeedQuery::for_filter(&filter, self.config.max_feed_results);
        let candidates = match self.feed.poll(&query).await {
            Ok(candidates) => candidates,
            Err(err) => {
                // Feed trouble costs this filter one cycle, nothing more.
                warn!(%run_id, filter = filter.id, error = %err, "feed poll failed");
                stats.feed_errors += 1;
                return Ok(stats);
            }
        };
        stats.candidates_seen = candidates.len();

        let now = Utc::now();
        let archive_cutoff = now - ChronoDuration::days(self.config.archive_max_age_days);
        let mut shortlisted = Vec::new();
        for tender in candidates {
            if tender.published_at < archive_cutoff {
                stats.archived_dropped += 1;
                continue;
            }
            let pre = self.matcher.pre_score(&tender, &filter);
            if pre.is_rejected() || pre.score < self.config.pre_score_threshold {
                stats.pre_score_dropped += 1;
                continue;
            }
            shortlisted.push(tender);
        }

        let enriched = self.enrich_batch(&filter, shortlisted).await;
        stats.enriched = enriched.len();

        // Delivery walks candidates strictly in feed order.
        let mut retained = 0usize;
        for tender in enriched {
            if *self.shutdown_rx.borrow() {
                debug!(filter = filter.id, "drain requested, no further reservations");
                break;
            }
            let now = Utc::now();
            let report = self.matcher.full_score(&tender, &filter, now);
            if report.is_rejected() || report.score < self.config.pre_notify_score {
                stats.full_score_dropped += 1;
                continue;
            }
            retained += 1;
            if retained > self.config.max_candidates_per_filter {
                debug!(filter = filter.id, "per-filter candidate cap reached");
                break;
            }

            let assessment = self
                .consult_oracle(&mut stats, &subscriber, &filter, &tender, now)
                .await?;
            let composite = report.composite(&assessment);
            if composite < self.config.min_score_for_notification {
                stats.below_notify_threshold += 1;
                continue;
            }

            let mut final_report = report.clone();
            final_report.score = composite;
            final_report.oracle_confidence = assessment.confidence;

            match self
                .store
                .reserve(subscriber.id, filter.id, &tender.raw.number, now)
                .await?
            {
                ReserveOutcome::AlreadyDelivered => {
                    stats.already_delivered += 1;
                }
                ReserveOutcome::Reserved(reservation) => {
                    let outcome = self
                        .deliver(&reservation, &subscriber, &filter, &tender, &final_report)
                        .await?;
                    match outcome.disposition {
                        DeliveryDisposition::Sent => stats.sent += 1,
                        DeliveryDisposition::QuietDeferred => stats.quiet_deferred += 1,
                        DeliveryDisposition::QuotaSkipped => stats.quota_skipped += 1,
                        DeliveryDisposition::Transient => stats.sink_transient += 1,
                        DeliveryDisposition::Permanent => {}
                    }
                    if outcome.recipient_blocked {
                        stats.sink_permanent += 1;
                        // The subscriber is blocked now; the rest of this
                        // filter's candidates cannot go anywhere.
                        break;
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Enriches the shortlist with bounded parallelism, preserving feed
    /// order in the result.
    async fn enrich_batch(
        &self,
        filter: &TenderFilter,
        shortlisted: Vec<sniper_core::RawTender>,
    ) -> Vec<EnrichedTender> {
        let per_filter = Arc::new(Semaphore::new(self.config.enrich_per_filter.max(1)));
        let mut tasks: JoinSet<(usize, EnrichedTender)> = JoinSet::new();

        for (index, tender) in shortlisted.into_iter().enumerate() {
            let feed = self.feed.clone();
            let per_filter = per_filter.clone();
            let global = self.enrich_global.clone();
            tasks.spawn(async move {
                let _per_filter = per_filter.acquire_owned().await.expect("semaphore open");
                let _global = global.acquire_owned().await.expect("semaphore open");
                let enriched = feed.enrich(&tender).await;
                (index, enriched)
            });
        }

        let mut slots: Vec<Option<EnrichedTender>> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, enriched)) => {
                    if slots.len() <= index {
                        slots.resize(index + 1, None);
                    }
                    slots[index] = Some(enriched);
                }
                Err(join_err) => {
                    warn!(filter = filter.id, error = %join_err, "enrichment task panicked");
                }
            }
        }
        slots.into_iter().flatten().collect()
    }

    /// Step d of the cascade: cached confidences are free, fresh calls run
    /// under the oracle quota, and an exhausted quota yields UNKNOWN with
    /// no boost.
    async fn consult_oracle(
        &self,
        stats: &mut CycleSummary,
        subscriber: &Subscriber,
        filter: &TenderFilter,
        tender: &EnrichedTender,
        now: DateTime<Utc>,
    ) -> Result<OracleAssessment, StoreError> {
        let Some(intent) = filter.intent() else {
            return Ok(OracleAssessment::unknown());
        };

        if let Some(cached) = self.oracle.cached(tender, &intent).await {
            return Ok(cached);
        }

        if self
            .store
            .try_consume(subscriber, QuotaResource::OracleCalls, 1, now)
            .await?
        {
            stats.oracle_consulted += 1;
            Ok(self.oracle.assess(tender, &intent).await)
        } else {
            debug!(
                subscriber = subscriber.id,
                tender = %tender.raw.number,
                "oracle quota exhausted, UNKNOWN with no boost"
            );
            Ok(OracleAssessment::unknown())
        }
    }

    /// Steps g–i: quiet hours, notification quota, send, confirm. Every
    /// path that does not confirm releases the reservation before
    /// returning, so no exit leaks a tentative row.
    async fn deliver(
        &self,
        reservation: &Reservation,
        subscriber: &Subscriber,
        filter: &TenderFilter,
        tender: &EnrichedTender,
        report: &sniper_core::ScoreReport,
    ) -> Result<DeliveryOutcome, StoreError> {
        let now = Utc::now();

        if subscriber.in_quiet_hours(now) {
            self.store
                .abandon(reservation, AbandonCause::QuietHours)
                .await?;
            return Ok(DeliveryOutcome {
                disposition: DeliveryDisposition::QuietDeferred,
                recipient_blocked: false,
            });
        }

        // Pre-authorise so the cap is never overshot; refunded below if
        // nothing actually goes out.
        if !self
            .store
            .try_consume(subscriber, QuotaResource::Notifications, 1, now)
            .await?
        {
            self.store
                .abandon(reservation, AbandonCause::QuotaExhausted)
                .await?;
            return Ok(DeliveryOutcome {
                disposition: DeliveryDisposition::QuotaSkipped,
                recipient_blocked: false,
            });
        }

        let chats = if filter.notify_chat_ids.is_empty() {
            vec![subscriber.chat_id]
        } else {
            filter.notify_chat_ids.clone()
        };

        let mut any_sent = false;
        let mut permanent_reason: Option<String> = None;
        for chat_id in chats {
            match self
                .sink
                .send(subscriber, chat_id, tender, report, &filter.name)
                .await
            {
                SendOutcome::Sent => any_sent = true,
                SendOutcome::Transient(reason) => {
                    debug!(chat_id, reason = %reason, "sink transient failure");
                }
                SendOutcome::Permanent(reason) => permanent_reason = Some(reason),
            }
        }

        // An unreachable recipient escalates unconditionally, whether or
        // not another chat in the group took the message.
        if let Some(reason) = &permanent_reason {
            self.store.mark_blocked(subscriber.id).await?;
            warn!(
                subscriber = subscriber.id,
                reason = %reason,
                "recipient unreachable, delivery blocked until liveness"
            );
        }

        if any_sent {
            self.store.confirm(reservation, Utc::now()).await?;
            return Ok(DeliveryOutcome {
                disposition: DeliveryDisposition::Sent,
                recipient_blocked: permanent_reason.is_some(),
            });
        }

        self.store
            .refund(subscriber, QuotaResource::Notifications, 1, now)
            .await?;

        if permanent_reason.is_some() {
            self.store
                .abandon(reservation, AbandonCause::SinkPermanent)
                .await?;
            Ok(DeliveryOutcome {
                disposition: DeliveryDisposition::Permanent,
                recipient_blocked: true,
            })
        } else {
            self.store
                .abandon(reservation, AbandonCause::SinkTransient)
                .await?;
            Ok(DeliveryOutcome {
                disposition: DeliveryDisposition::Transient,
                recipient_blocked: false,
            })
        }
    }
}
