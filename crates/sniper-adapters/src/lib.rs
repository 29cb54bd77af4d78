//! External collaborator contracts and their production implementations:
//! the zakupki.gov.ru RSS feed with detail-page enrichment, the HTTP
//! relevance oracle and the Telegram notification sink.
//!
//! The pipeline engine only sees the traits; tests substitute in-memory
//! fakes.

mod oracle;
mod sink;
mod zakupki;

use async_trait::async_trait;
use thiserror::Error;

use sniper_core::{
    EnrichedTender, FilterIntent, LawType, OracleAssessment, RawTender, ScoreReport, Subscriber,
    TenderFilter, TenderType,
};
use sniper_storage::FetchError;

pub use oracle::{oracle_cache_key, HttpRelevanceOracle, OracleConfig};
pub use sink::{TelegramSink, TelegramSinkConfig};
pub use zakupki::{ZakupkiConfig, ZakupkiFeed};

pub const CRATE_NAME: &str = "sniper-adapters";

/// One feed query, derived from a filter. The feed treats the keyword
/// string as a single morphology-aware search. Regions only narrow the
/// server-side result set; the matcher remains the authority on region
/// acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub keywords: String,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub law_type: LawType,
    pub tender_type: Option<TenderType>,
    pub regions: Vec<String>,
    pub max_results: usize,
}

impl FeedQuery {
    pub fn for_filter(filter: &TenderFilter, max_results: usize) -> Self {
        Self {
            keywords: filter.keywords.join(" "),
            price_min: filter.price_min,
            price_max: filter.price_max,
            law_type: filter.law_type,
            // The feed only honours a single type; the matcher re-checks.
            tender_type: filter.tender_types.first().copied(),
            regions: filter.regions.clone(),
            max_results,
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("feed payload unparseable: {0}")]
    Payload(String),
}

impl FeedError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(err) => err.is_transient(),
            Self::Payload(_) => false,
        }
    }
}

/// Upstream procurement feed. One poll yields a finite batch of raw
/// tenders; enrichment fetches the detail page on demand and degrades to a
/// partial record instead of failing.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn poll(&self, query: &FeedQuery) -> Result<Vec<RawTender>, FeedError>;

    async fn enrich(&self, raw: &RawTender) -> EnrichedTender;
}

/// Semantic verifier over a (tender, filter-intent) pair. Transport
/// failures come back as UNKNOWN, never as an error: relevance checking is
/// advisory and must not unwind a cycle.
#[async_trait]
pub trait RelevanceOracle: Send + Sync {
    async fn assess(&self, tender: &EnrichedTender, intent: &FilterIntent) -> OracleAssessment;

    /// Previously cached assessment, if any. Cache hits are free: the
    /// engine only spends oracle quota on fresh `assess` calls, and cached
    /// confidences stay valid after the quota runs out.
    async fn cached(
        &self,
        _tender: &EnrichedTender,
        _intent: &FilterIntent,
    ) -> Option<OracleAssessment> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Rate limit, timeout, 5xx. The reservation is released and the
    /// tender retried next cycle.
    Transient(String),
    /// Recipient blocked or gone. The subscriber is flagged
    /// delivery-blocked until a liveness signal.
    Permanent(String),
}

/// Delivery channel for rendered notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        subscriber: &Subscriber,
        chat_id: i64,
        tender: &EnrichedTender,
        report: &ScoreReport,
        filter_name: &str,
    ) -> SendOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_query_takes_the_first_wanted_type() {
        use sniper_core::TenderFilter;
        let filter = TenderFilter {
            id: 1,
            subscriber_id: 1,
            name: "t".into(),
            is_active: true,
            deleted_at: None,
            keywords: vec!["ноутбук".into(), "моноблок".into()],
            exclude_keywords: vec![],
            primary_keywords: vec![],
            secondary_keywords: vec![],
            regions: vec![],
            price_min: Some(500_000.0),
            price_max: None,
            tender_types: vec![TenderType::Goods, TenderType::Services],
            law_type: LawType::Fz44,
            ai_intent: None,
            ai_intent_version: 0,
            expanded_keywords: vec![],
            min_deadline_days: 0,
            notify_chat_ids: vec![],
        };
        let query = FeedQuery::for_filter(&filter, 50);
        assert_eq!(query.keywords, "ноутбук моноблок");
        assert_eq!(query.tender_type, Some(TenderType::Goods));
        assert_eq!(query.law_type, LawType::Fz44);
        assert!(query.regions.is_empty());
    }
}
