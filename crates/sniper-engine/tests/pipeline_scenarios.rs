//! End-to-end poll-cycle scenarios over in-memory collaborators and a real
//! in-memory store: at-most-once delivery, quota enforcement, quiet hours,
//! blocked recipients and the guard rails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, NaiveTime, Utc};

use sniper_adapters::{
    FeedError, FeedQuery, FeedSource, NotificationSink, RelevanceOracle, SendOutcome,
};
use sniper_core::{
    EnrichedTender, FilterIntent, LawType, NullRegionPolicy, OracleAssessment, QuietHours,
    RawTender, ScoreReport, Subscriber, TenderFilter, TenderType, Tier,
};
use sniper_engine::{EngineConfig, EngineState, PipelineEngine};
use sniper_match::{MatcherRules, SmartMatcher};
use sniper_storage::{QuotaResource, SniperStore};

#[derive(Debug, Clone, Default)]
struct Enrichment {
    price: Option<f64>,
    region: Option<String>,
    deadline: Option<NaiveDateTime>,
}

#[derive(Default)]
struct FakeFeed {
    tenders: Mutex<Vec<RawTender>>,
    enrichments: Mutex<HashMap<String, Enrichment>>,
}

impl FakeFeed {
    fn set_tenders(&self, tenders: Vec<RawTender>) {
        *self.tenders.lock().unwrap() = tenders;
    }

    fn set_enrichment(&self, number: &str, enrichment: Enrichment) {
        self.enrichments
            .lock()
            .unwrap()
            .insert(number.to_string(), enrichment);
    }
}

#[async_trait]
impl FeedSource for FakeFeed {
    async fn poll(&self, _query: &FeedQuery) -> Result<Vec<RawTender>, FeedError> {
        Ok(self.tenders.lock().unwrap().clone())
    }

    async fn enrich(&self, raw: &RawTender) -> EnrichedTender {
        let mut enriched = EnrichedTender::from_raw(raw.clone());
        if let Some(overlay) = self.enrichments.lock().unwrap().get(&raw.number) {
            enriched.price = overlay.price;
            enriched.customer_region = overlay.region.clone();
            enriched.deadline = overlay.deadline;
        }
        enriched
    }
}

struct FakeOracle {
    confidence: Mutex<Option<u8>>,
    calls: AtomicUsize,
}

impl FakeOracle {
    fn with_confidence(confidence: Option<u8>) -> Self {
        Self {
            confidence: Mutex::new(confidence),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceOracle for FakeOracle {
    async fn assess(&self, _tender: &EnrichedTender, _intent: &FilterIntent) -> OracleAssessment {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match *self.confidence.lock().unwrap() {
            Some(confidence) => OracleAssessment::from_confidence(confidence),
            None => OracleAssessment::unknown(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkMode {
    Deliver,
    Transient,
    Permanent,
}

struct FakeSink {
    mode: Mutex<SinkMode>,
    per_chat: Mutex<HashMap<i64, SinkMode>>,
    sent: Mutex<Vec<(i64, String)>>,
}

impl FakeSink {
    fn new(mode: SinkMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            per_chat: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn set_mode(&self, mode: SinkMode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn set_chat_mode(&self, chat_id: i64, mode: SinkMode) {
        self.per_chat.lock().unwrap().insert(chat_id, mode);
    }

    fn mode_for(&self, chat_id: i64) -> SinkMode {
        self.per_chat
            .lock()
            .unwrap()
            .get(&chat_id)
            .copied()
            .unwrap_or(*self.mode.lock().unwrap())
    }

    fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for FakeSink {
    async fn send(
        &self,
        _subscriber: &Subscriber,
        chat_id: i64,
        tender: &EnrichedTender,
        _report: &ScoreReport,
        _filter_name: &str,
    ) -> SendOutcome {
        match self.mode_for(chat_id) {
            SinkMode::Deliver => {
                self.sent
                    .lock()
                    .unwrap()
                    .push((chat_id, tender.raw.number.clone()));
                SendOutcome::Sent
            }
            SinkMode::Transient => SendOutcome::Transient("429: retry later".into()),
            SinkMode::Permanent => SendOutcome::Permanent("bot was blocked by the user".into()),
        }
    }
}

struct Harness {
    engine: PipelineEngine,
    store: SniperStore,
    feed: Arc<FakeFeed>,
    oracle: Arc<FakeOracle>,
    sink: Arc<FakeSink>,
    subscriber: Subscriber,
    filter_id: i64,
}

fn base_filter(subscriber_id: i64) -> TenderFilter {
    TenderFilter {
        id: 0,
        subscriber_id,
        name: "ИТ оборудование".into(),
        is_active: true,
        deleted_at: None,
        keywords: vec!["ноутбук".into()],
        exclude_keywords: vec![],
        primary_keywords: vec![],
        secondary_keywords: vec![],
        regions: vec!["Москва".into()],
        price_min: Some(500_000.0),
        price_max: Some(2_000_000.0),
        tender_types: vec![TenderType::Goods],
        law_type: LawType::Fz44,
        ai_intent: Some("Закупки ноутбуков и персональных компьютеров".into()),
        ai_intent_version: 1,
        expanded_keywords: vec![],
        min_deadline_days: 5,
        notify_chat_ids: vec![],
    }
}

fn tender(number: &str, title: &str) -> RawTender {
    RawTender {
        number: number.into(),
        title: title.into(),
        description: None,
        customer: "ГБУ г. Москва".into(),
        customer_inn: None,
        price: Some(1_200_000.0),
        tender_type: Some(TenderType::Goods),
        law_type: Some(LawType::Fz44),
        published_at: Utc::now() - Duration::days(2),
        deadline: None,
        region_hint: None,
        url: format!("https://zakupki.gov.ru/notice?regNumber={number}"),
    }
}

fn moscow_enrichment() -> Enrichment {
    Enrichment {
        price: None,
        region: Some("Москва".into()),
        deadline: Some((Utc::now() + Duration::days(10)).naive_utc()),
    }
}

async fn harness_with(
    tier: Tier,
    quiet_hours: Option<QuietHours>,
    confidence: Option<u8>,
    policy: NullRegionPolicy,
    mutate_filter: impl FnOnce(&mut TenderFilter),
) -> Harness {
    let store = SniperStore::connect_in_memory().await.unwrap();
    let subscriber_id = store
        .upsert_subscriber(100, tier, quiet_hours, "Europe/Moscow")
        .await
        .unwrap();
    let subscriber = store.subscriber(subscriber_id).await.unwrap().unwrap();

    let mut filter = base_filter(subscriber_id);
    mutate_filter(&mut filter);
    let filter_id = store.create_filter(&filter).await.unwrap();

    let feed = Arc::new(FakeFeed::default());
    let oracle = Arc::new(FakeOracle::with_confidence(confidence));
    let sink = Arc::new(FakeSink::new(SinkMode::Deliver));

    let config = EngineConfig {
        null_region_policy: policy,
        ..EngineConfig::default()
    };
    let matcher = SmartMatcher::new(MatcherRules::default(), policy);
    let engine = PipelineEngine::new(
        store.clone(),
        feed.clone(),
        oracle.clone(),
        sink.clone(),
        matcher,
        config,
    );

    Harness {
        engine,
        store,
        feed,
        oracle,
        sink,
        subscriber,
        filter_id,
    }
}

async fn harness(confidence: Option<u8>) -> Harness {
    harness_with(
        Tier::Basic,
        None,
        confidence,
        NullRegionPolicy::Penalise,
        |_| {},
    )
    .await
}

#[tokio::test]
async fn basic_match_sends_exactly_once() {
    // S1: matching tender, region and price in band, oracle confident.
    let h = harness(Some(72)).await;
    h.feed.set_tenders(vec![tender("0372-1", "Поставка ноутбуков")]);
    h.feed.set_enrichment("0372-1", moscow_enrichment());

    let summary = h.engine.run_cycle().await.unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(h.sink.sent(), vec![(100, "0372-1".to_string())]);
    assert_eq!(h.oracle.call_count(), 1);
    assert_eq!(h.store.confirmed_count(h.subscriber.id).await.unwrap(), 1);
    let (used, _) = h
        .store
        .quota_usage(&h.subscriber, QuotaResource::Notifications, Utc::now())
        .await
        .unwrap();
    assert_eq!(used, 1);
}

#[tokio::test]
async fn repeated_cycles_never_duplicate() {
    // S2 and property 8: the same feed response twice produces one send.
    let h = harness(Some(72)).await;
    h.feed.set_tenders(vec![tender("0372-1", "Поставка ноутбуков")]);
    h.feed.set_enrichment("0372-1", moscow_enrichment());

    h.engine.run_cycle().await.unwrap();
    let second = h.engine.run_cycle().await.unwrap();

    assert_eq!(h.sink.sent().len(), 1);
    assert_eq!(second.sent, 0);
    assert_eq!(second.already_delivered, 1);
    let (used, _) = h
        .store
        .quota_usage(&h.subscriber, QuotaResource::Notifications, Utc::now())
        .await
        .unwrap();
    assert_eq!(used, 1);
}

#[tokio::test]
async fn foreign_region_hard_rejects_before_the_oracle() {
    // S3: wrong canonical region: no oracle call, no send, quota untouched.
    let h = harness(Some(72)).await;
    h.feed
        .set_tenders(vec![tender("0372-2", "Поставка ноутбуков")]);
    h.feed.set_enrichment(
        "0372-2",
        Enrichment {
            region: Some("Республика Татарстан".into()),
            deadline: Some((Utc::now() + Duration::days(10)).naive_utc()),
            ..Default::default()
        },
    );

    let summary = h.engine.run_cycle().await.unwrap();

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.full_score_dropped, 1);
    assert_eq!(h.oracle.call_count(), 0);
    assert!(h.sink.sent().is_empty());
    let (used, _) = h
        .store
        .quota_usage(&h.subscriber, QuotaResource::OracleCalls, Utc::now())
        .await
        .unwrap();
    assert_eq!(used, 0);
}

#[tokio::test]
async fn null_region_policies_gate_unresolvable_customers() {
    // S4: same tender, three policies. The compound keyword scores 35, the
    // in-band price 20; `penalise` subtracts 20 and the oracle boost keeps
    // the composite over the line.
    for (policy, expect_send) in [
        (NullRegionPolicy::Reject, false),
        (NullRegionPolicy::Penalise, true),
        (NullRegionPolicy::Pass, true),
    ] {
        let h = harness_with(Tier::Basic, None, Some(72), policy, |f| {
            f.keywords = vec!["поставка ноутбуков".into()];
        })
        .await;
        h.feed.set_tenders(vec![tender("0372-3", "Поставка ноутбуков")]);
        h.feed.set_enrichment(
            "0372-3",
            Enrichment {
                deadline: Some((Utc::now() + Duration::days(10)).naive_utc()),
                ..Default::default()
            },
        );

        let summary = h.engine.run_cycle().await.unwrap();
        assert_eq!(
            summary.sent,
            usize::from(expect_send),
            "policy {policy:?} expected send={expect_send}"
        );
    }
}

#[tokio::test]
async fn quota_exhaustion_sends_in_feed_order_and_recovers_next_day() {
    // S5: 49 of 50 notifications used, two matches. Exactly one goes out,
    // in feed order; after the local day boundary the other follows.
    let h = harness(Some(72)).await;
    assert!(h
        .store
        .try_consume(&h.subscriber, QuotaResource::Notifications, 49, Utc::now())
        .await
        .unwrap());

    h.feed.set_tenders(vec![
        tender("T4", "Поставка ноутбуков для школ"),
        tender("T5", "Поставка ноутбуков для больниц управления"),
    ]);
    h.feed.set_enrichment("T4", moscow_enrichment());
    h.feed.set_enrichment("T5", moscow_enrichment());

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.quota_skipped, 1);
    assert_eq!(h.sink.sent(), vec![(100, "T4".to_string())]);

    // Same day again: the first is deduped, the second still over quota.
    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.already_delivered, 1);
    assert_eq!(summary.quota_skipped, 1);

    // Local midnight passes.
    let yesterday = h.subscriber.local_date(Utc::now()) - Duration::days(1);
    h.store
        .backdate_quota(h.subscriber.id, QuotaResource::Notifications, yesterday)
        .await
        .unwrap();

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(
        h.sink.sent(),
        vec![(100, "T4".to_string()), (100, "T5".to_string())]
    );
}

#[tokio::test]
async fn blocked_subscriber_gets_nothing_until_liveness() {
    // S6: while blocked, the filter is not even consulted; liveness
    // reopens delivery and the tender then goes out.
    let h = harness(Some(72)).await;
    h.store.mark_blocked(h.subscriber.id).await.unwrap();

    h.feed.set_tenders(vec![tender("T6", "Поставка ноутбуков")]);
    h.feed.set_enrichment("T6", moscow_enrichment());

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.filters_processed, 0);
    assert!(h.sink.sent().is_empty());
    assert_eq!(h.store.confirmed_count(h.subscriber.id).await.unwrap(), 0);

    h.store.record_liveness(h.subscriber.chat_id).await.unwrap();
    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(h.sink.sent(), vec![(100, "T6".to_string())]);
}

#[tokio::test]
async fn permanent_sink_failure_blocks_the_subscriber() {
    let h = harness(Some(72)).await;
    h.sink.set_mode(SinkMode::Permanent);
    h.feed.set_tenders(vec![tender("0372-1", "Поставка ноутбуков")]);
    h.feed.set_enrichment("0372-1", moscow_enrichment());

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.sink_permanent, 1);
    assert_eq!(summary.sent, 0);
    assert!(h.store.is_blocked(h.subscriber.id).await.unwrap());
    assert_eq!(h.store.confirmed_count(h.subscriber.id).await.unwrap(), 0);
    // The failed attempt must not burn quota.
    let (used, _) = h
        .store
        .quota_usage(&h.subscriber, QuotaResource::Notifications, Utc::now())
        .await
        .unwrap();
    assert_eq!(used, 0);

    // Liveness returns; the tender is retryable and now deliverable.
    h.sink.set_mode(SinkMode::Deliver);
    h.store.record_liveness(h.subscriber.chat_id).await.unwrap();
    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn group_permanent_failure_blocks_even_when_another_chat_succeeds() {
    // A filter routed to two chats: one takes the message, the other
    // reports the recipient gone. The delivery stands, the escalation
    // happens anyway.
    let h = harness_with(Tier::Basic, None, Some(72), NullRegionPolicy::Penalise, |f| {
        f.notify_chat_ids = vec![501, 502];
    })
    .await;
    h.sink.set_chat_mode(501, SinkMode::Deliver);
    h.sink.set_chat_mode(502, SinkMode::Permanent);
    h.feed.set_tenders(vec![tender("0372-1", "Поставка ноутбуков")]);
    h.feed.set_enrichment("0372-1", moscow_enrichment());

    let summary = h.engine.run_cycle().await.unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(h.sink.sent(), vec![(501, "0372-1".to_string())]);
    assert_eq!(h.store.confirmed_count(h.subscriber.id).await.unwrap(), 1);
    // The unreachable chat still flags the subscriber.
    assert_eq!(summary.sink_permanent, 1);
    assert!(h.store.is_blocked(h.subscriber.id).await.unwrap());
    // Quota charged exactly once for the notification that went out.
    let (used, _) = h
        .store
        .quota_usage(&h.subscriber, QuotaResource::Notifications, Utc::now())
        .await
        .unwrap();
    assert_eq!(used, 1);
}

#[tokio::test]
async fn transient_sink_failure_retries_next_cycle() {
    let h = harness(Some(72)).await;
    h.sink.set_mode(SinkMode::Transient);
    h.feed.set_tenders(vec![tender("0372-1", "Поставка ноутбуков")]);
    h.feed.set_enrichment("0372-1", moscow_enrichment());

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.sink_transient, 1);
    assert_eq!(summary.sent, 0);
    assert!(!h.store.is_blocked(h.subscriber.id).await.unwrap());

    h.sink.set_mode(SinkMode::Deliver);
    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(h.sink.sent(), vec![(100, "0372-1".to_string())]);
}

#[tokio::test]
async fn quiet_hours_defer_until_the_window_ends() {
    // Build a window that covers local-now, then move it away.
    let now_local = Utc::now().with_timezone(&chrono_tz::Europe::Moscow).time();
    let quiet = QuietHours {
        start: shifted(now_local, -60),
        end: shifted(now_local, 60),
    };
    let h = harness_with(Tier::Basic, Some(quiet), Some(72), NullRegionPolicy::Penalise, |_| {}).await;
    h.feed.set_tenders(vec![tender("0372-1", "Поставка ноутбуков")]);
    h.feed.set_enrichment("0372-1", moscow_enrichment());

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.quiet_deferred, 1);
    assert_eq!(summary.sent, 0);
    // No quota charge, no ledger row: the tender is only deferred.
    let (used, _) = h
        .store
        .quota_usage(&h.subscriber, QuotaResource::Notifications, Utc::now())
        .await
        .unwrap();
    assert_eq!(used, 0);

    // The window ends.
    let away = QuietHours {
        start: shifted(now_local, 120),
        end: shifted(now_local, 180),
    };
    h.store
        .upsert_subscriber(100, Tier::Basic, Some(away), "Europe/Moscow")
        .await
        .unwrap();

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn archive_and_deadline_guards_hold() {
    let h = harness(Some(72)).await;
    let mut stale = tender("OLD-1", "Поставка ноутбуков");
    stale.published_at = Utc::now() - Duration::days(100);
    let mut fresh = tender("NEW-1", "Поставка ноутбуков");
    fresh.published_at = Utc::now() - Duration::days(1);
    h.feed.set_tenders(vec![stale, fresh]);
    // The fresh one has a deadline inside the 5-day safety margin.
    h.feed.set_enrichment(
        "NEW-1",
        Enrichment {
            region: Some("Москва".into()),
            deadline: Some((Utc::now() + Duration::days(2)).naive_utc()),
            ..Default::default()
        },
    );

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.archived_dropped, 1);
    assert_eq!(summary.full_score_dropped, 1);
    assert_eq!(summary.sent, 0);
    assert!(h.sink.sent().is_empty());
}

#[tokio::test]
async fn exhausted_oracle_quota_means_no_boost() {
    // Full score lands at exactly 30 (compound 35, one negative pattern
    // −5). With the boost the composite clears 35; without it the tender
    // must NOT be promoted by a default confidence.
    let h = harness_with(Tier::Trial, None, Some(72), NullRegionPolicy::Penalise, |f| {
        f.keywords = vec!["поставка ноутбуков".into()];
        f.regions = vec![];
        f.price_min = None;
        f.price_max = None;
    })
    .await;
    h.feed.set_tenders(vec![tender(
        "0372-9",
        "Поставка ноутбуков для нужд страхования",
    )]);
    h.feed.set_enrichment(
        "0372-9",
        Enrichment {
            deadline: Some((Utc::now() + Duration::days(10)).naive_utc()),
            ..Default::default()
        },
    );

    // Burn the whole trial oracle quota.
    assert!(h
        .store
        .try_consume(&h.subscriber, QuotaResource::OracleCalls, 20, Utc::now())
        .await
        .unwrap());

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(h.oracle.call_count(), 0);
    assert_eq!(summary.below_notify_threshold, 1);
    assert_eq!(summary.sent, 0);

    // With quota available the same tender clears the bar.
    let yesterday = h.subscriber.local_date(Utc::now()) - Duration::days(1);
    h.store
        .backdate_quota(h.subscriber.id, QuotaResource::OracleCalls, yesterday)
        .await
        .unwrap();
    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(h.oracle.call_count(), 1);
    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn oracle_transport_failure_is_unknown_not_fifty() {
    // Same borderline tender; the oracle errors out. UNKNOWN carries no
    // boost, so nothing is sent.
    let h = harness_with(Tier::Basic, None, None, NullRegionPolicy::Penalise, |f| {
        f.keywords = vec!["поставка ноутбуков".into()];
        f.regions = vec![];
        f.price_min = None;
        f.price_max = None;
    })
    .await;
    h.feed.set_tenders(vec![tender(
        "0372-9",
        "Поставка ноутбуков для нужд страхования",
    )]);
    h.feed.set_enrichment(
        "0372-9",
        Enrichment {
            deadline: Some((Utc::now() + Duration::days(10)).naive_utc()),
            ..Default::default()
        },
    );

    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(h.oracle.call_count(), 1);
    assert_eq!(summary.below_notify_threshold, 1);
    assert_eq!(summary.sent, 0);
}

#[tokio::test]
async fn soft_deleted_filters_are_never_consulted() {
    let h = harness(Some(72)).await;
    h.feed.set_tenders(vec![tender("0372-1", "Поставка ноутбуков")]);
    h.feed.set_enrichment("0372-1", moscow_enrichment());

    h.store
        .soft_delete_filter(h.filter_id, Utc::now())
        .await
        .unwrap();
    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.filters_processed, 0);
    assert!(h.sink.sent().is_empty());

    // Restoration does not re-send what was already delivered.
    h.store.restore_filter(h.filter_id).await.unwrap();
    h.engine.run_cycle().await.unwrap();
    assert_eq!(h.sink.sent().len(), 1);
    let summary = h.engine.run_cycle().await.unwrap();
    assert_eq!(summary.already_delivered, 1);
    assert_eq!(h.sink.sent().len(), 1);
}

#[tokio::test]
async fn stop_is_terminal() {
    let h = harness(Some(72)).await;
    assert_eq!(h.engine.state(), EngineState::Idle);
    h.engine.stop();
    assert_eq!(h.engine.state(), EngineState::Stopping);
    // The run loop exits immediately once stopping.
    h.engine.run().await.unwrap();
    assert_eq!(h.engine.state(), EngineState::Stopping);
}

fn shifted(time: NaiveTime, minutes: i64) -> NaiveTime {
    time.overflowing_add_signed(chrono::Duration::minutes(minutes)).0
}
