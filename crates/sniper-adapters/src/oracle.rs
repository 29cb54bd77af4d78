//! HTTP relevance oracle. Posts a compact (tender, intent) payload to the
//! configured verifier endpoint and maps the returned confidence onto the
//! accept/recheck/reject bands. Confidences persist in the oracle cache;
//! UNKNOWN outcomes never do.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use sniper_core::{EnrichedTender, FilterIntent, OracleAssessment};
use sniper_storage::{CacheKind, SniperStore};

use crate::RelevanceOracle;

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Cache key: the tender identity and the intent version. Editing a
/// filter's matching inputs bumps the version, so stale confidences stop
/// resolving.
pub fn oracle_cache_key(tender_number: &str, intent_version: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tender_number.as_bytes());
    hasher.update(b"|");
    hasher.update(intent_version.to_le_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct OracleResponse {
    confidence: u8,
    #[serde(default)]
    #[allow(dead_code)]
    reasoning: Option<String>,
}

pub struct HttpRelevanceOracle {
    client: reqwest::Client,
    config: OracleConfig,
    store: SniperStore,
}

impl HttpRelevanceOracle {
    pub fn new(config: OracleConfig, store: SniperStore) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            store,
        })
    }
}

#[async_trait]
impl RelevanceOracle for HttpRelevanceOracle {
    async fn cached(
        &self,
        tender: &EnrichedTender,
        intent: &FilterIntent,
    ) -> Option<OracleAssessment> {
        let key = oracle_cache_key(&tender.raw.number, intent.version);
        match self.store.cache_get(CacheKind::Oracle, &key, Utc::now()).await {
            Ok(Some(value)) => value
                .get("confidence")
                .and_then(|v| v.as_u64())
                .map(|confidence| OracleAssessment::from_confidence(confidence.min(100) as u8)),
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "oracle cache read failed");
                None
            }
        }
    }

    async fn assess(&self, tender: &EnrichedTender, intent: &FilterIntent) -> OracleAssessment {
        let now = Utc::now();
        let key = oracle_cache_key(&tender.raw.number, intent.version);

        match self.store.cache_get(CacheKind::Oracle, &key, now).await {
            Ok(Some(value)) => {
                if let Some(confidence) = value.get("confidence").and_then(|v| v.as_u64()) {
                    debug!(tender = %tender.raw.number, confidence, "oracle cache hit");
                    return OracleAssessment::from_confidence(confidence.min(100) as u8);
                }
            }
            Ok(None) => {}
            Err(err) => {
                // A degraded cache never blocks the pipeline.
                warn!(error = %err, "oracle cache read failed");
            }
        }

        if self.config.endpoint.is_empty() {
            return OracleAssessment::unknown();
        }

        let payload = json!({
            "model": self.config.model,
            "tender": {
                "title": tender.effective_title(),
                "description": tender.raw.description,
                "customer": tender.raw.customer,
                "region": tender.customer_region,
            },
            "intent": {
                "text": intent.text,
                "version": intent.version,
            },
        });

        let mut request = self.client.post(&self.config.endpoint).json(&payload);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(tender = %tender.raw.number, error = %err, "oracle transport error, treating as UNKNOWN");
                return OracleAssessment::unknown();
            }
        };
        if !response.status().is_success() {
            warn!(tender = %tender.raw.number, status = %response.status(), "oracle returned non-success, treating as UNKNOWN");
            return OracleAssessment::unknown();
        }

        let parsed: OracleResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(tender = %tender.raw.number, error = %err, "oracle response unparseable, treating as UNKNOWN");
                return OracleAssessment::unknown();
            }
        };

        let assessment = OracleAssessment::from_confidence(parsed.confidence);
        if let Err(err) = self
            .store
            .cache_put(
                CacheKind::Oracle,
                &key,
                &json!({ "confidence": parsed.confidence.min(100) }),
                CacheKind::Oracle.default_ttl(),
                now,
            )
            .await
        {
            warn!(error = %err, "oracle cache write failed");
        }
        assessment
    }
}
