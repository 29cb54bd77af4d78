//! Engine configuration, read from the environment. Everything has a
//! production default; tests override fields directly.

use std::path::PathBuf;
use std::time::Duration;

use sniper_core::NullRegionPolicy;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub feed_base_url: String,
    pub bot_token: String,
    pub oracle_endpoint: String,
    pub oracle_model: String,
    pub oracle_api_key: Option<String>,
    /// Pause between cycle end and the next cycle start. Never measured
    /// start-to-start, so cycles cannot overlap.
    pub poll_interval: Duration,
    pub filter_concurrency: usize,
    pub enrich_per_filter: usize,
    pub enrich_global: usize,
    pub http_timeout: Duration,
    /// Minimum spacing between requests to the feed host.
    pub feed_min_interval: Duration,
    pub null_region_policy: NullRegionPolicy,
    /// Pre-score needed before enrichment is attempted.
    pub pre_score_threshold: i32,
    /// Full score needed before the oracle is consulted.
    pub pre_notify_score: i32,
    /// Composite score needed for a notification.
    pub min_score_for_notification: i32,
    pub max_candidates_per_filter: usize,
    pub max_feed_results: usize,
    /// Tenders published longer ago than this never enter the pipeline.
    pub archive_max_age_days: i64,
    pub user_agent: String,
    pub workspace_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://sniper.db".to_string(),
            feed_base_url: "https://zakupki.gov.ru".to_string(),
            bot_token: String::new(),
            oracle_endpoint: String::new(),
            oracle_model: "gpt-4o-mini".to_string(),
            oracle_api_key: None,
            poll_interval: Duration::from_secs(300),
            filter_concurrency: 4,
            enrich_per_filter: 8,
            enrich_global: 16,
            http_timeout: Duration::from_secs(10),
            feed_min_interval: Duration::from_secs(2),
            null_region_policy: NullRegionPolicy::Penalise,
            pre_score_threshold: 1,
            pre_notify_score: 30,
            min_score_for_notification: 35,
            max_candidates_per_filter: 50,
            max_feed_results: 100,
            archive_max_age_days: 90,
            user_agent: "tender-sniper/0.4".to_string(),
            workspace_root: PathBuf::from("."),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env_string("SNIPER_DATABASE_URL", &defaults.database_url),
            feed_base_url: env_string("SNIPER_FEED_URL", &defaults.feed_base_url),
            bot_token: env_string("SNIPER_BOT_TOKEN", ""),
            oracle_endpoint: env_string("SNIPER_ORACLE_URL", ""),
            oracle_model: env_string("SNIPER_ORACLE_MODEL", &defaults.oracle_model),
            oracle_api_key: std::env::var("SNIPER_ORACLE_API_KEY").ok().filter(|k| !k.is_empty()),
            poll_interval: Duration::from_secs(env_u64("SNIPER_POLL_INTERVAL_SECS", 300)),
            filter_concurrency: env_u64("SNIPER_FILTER_CONCURRENCY", 4) as usize,
            enrich_per_filter: env_u64("SNIPER_ENRICH_PER_FILTER", 8) as usize,
            enrich_global: env_u64("SNIPER_ENRICH_GLOBAL", 16) as usize,
            http_timeout: Duration::from_secs(env_u64("SNIPER_HTTP_TIMEOUT_SECS", 10)),
            feed_min_interval: Duration::from_millis(env_u64("SNIPER_FEED_MIN_INTERVAL_MS", 2000)),
            null_region_policy: std::env::var("SNIPER_NULL_REGION_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.null_region_policy),
            pre_score_threshold: env_u64("SNIPER_PRE_SCORE_THRESHOLD", 1) as i32,
            pre_notify_score: env_u64("SNIPER_PRE_NOTIFY_SCORE", 30) as i32,
            min_score_for_notification: env_u64("SNIPER_MIN_SCORE", 35) as i32,
            max_candidates_per_filter: env_u64("SNIPER_MAX_CANDIDATES", 50) as usize,
            max_feed_results: env_u64("SNIPER_MAX_FEED_RESULTS", 100) as usize,
            archive_max_age_days: env_u64("SNIPER_ARCHIVE_MAX_AGE_DAYS", 90) as i64,
            user_agent: env_string("SNIPER_USER_AGENT", &defaults.user_agent),
            workspace_root: PathBuf::from(env_string("SNIPER_WORKSPACE_ROOT", ".")),
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
