//! HTTP plumbing shared by the feed and enrichment adapters: hard
//! per-request timeouts, bounded retries with a doubling delay, global and
//! per-scope concurrency limits, and a minimum-interval pacer for hosts
//! that tolerate little load.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

/// Statuses worth a second attempt against the feed host: its rate
/// limiter (429) and the gateway errors it produces under load. Anything
/// else it answers deliberately; a 404 on a withdrawn notice or a 403 from
/// the bot filter comes back identical on retry.
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Bounded retry schedule. The delay doubles after every failed attempt,
/// capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub per_scope_concurrency: usize,
    pub retry: RetryPolicy,
    /// Minimum spacing between requests, across all scopes. The feed host
    /// rate-limits aggressively; two seconds keeps it content.
    pub min_request_interval: Option<Duration>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: None,
            global_concurrency: 16,
            per_scope_concurrency: 8,
            retry: RetryPolicy::default(),
            min_request_interval: None,
        }
    }
}

/// Serialises request starts so consecutive requests are at least
/// `min_interval` apart.
#[derive(Debug)]
struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        loop {
            let sleep_for = {
                let mut last = self.last_request.lock().await;
                match *last {
                    Some(at) => {
                        let elapsed = at.elapsed();
                        if elapsed >= self.min_interval {
                            *last = Some(Instant::now());
                            None
                        } else {
                            Some(self.min_interval - elapsed)
                        }
                    }
                    None => {
                        *last = Some(Instant::now());
                        None
                    }
                }
            };
            match sleep_for {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    /// Whether a later attempt (or a later cycle) can expect a different
    /// answer. Timeouts and refused connections qualify; whatever the
    /// server decided on purpose does not, and neither does a request we
    /// built wrong ourselves.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            Self::Transport(source) => source.is_timeout() || source.is_connect(),
        }
    }
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
    per_scope_limit: usize,
    per_scope: Mutex<HashMap<String, Arc<Semaphore>>>,
    pacer: Option<RequestPacer>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;

        Ok(Self {
            client,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            per_scope_limit: config.per_scope_concurrency.max(1),
            per_scope: Mutex::new(HashMap::new()),
            pacer: config.min_request_interval.map(RequestPacer::new),
            retry: config.retry,
        })
    }

    async fn per_scope_semaphore(&self, scope: &str) -> Arc<Semaphore> {
        let mut map = self.per_scope.lock().await;
        map.entry(scope.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_scope_limit)))
            .clone()
    }

    /// One GET, classified. Success means a 2xx with a readable body.
    async fn attempt(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let body = response.bytes().await?.to_vec();
        Ok(FetchedResponse {
            status,
            final_url,
            body,
        })
    }

    async fn attempt_with_retries(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        let mut attempts_left = self.retry.attempts.max(1);
        let mut next_delay = self.retry.initial_delay;

        loop {
            if let Some(pacer) = &self.pacer {
                pacer.wait().await;
            }
            attempts_left -= 1;

            let failure = match self.attempt(url).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };
            if attempts_left == 0 || !failure.is_transient() {
                return Err(failure);
            }

            debug!(attempts_left, delay_ms = next_delay.as_millis() as u64, error = %failure, "retrying fetch");
            tokio::time::sleep(next_delay).await;
            next_delay = (next_delay * 2).min(self.retry.max_delay);
        }
    }

    /// GET with retries. `scope` names the concurrency bucket: one per
    /// filter for enrichment, a fixed label for feed polls.
    pub async fn fetch_bytes(
        &self,
        run_id: Uuid,
        scope: &str,
        url: &str,
    ) -> Result<FetchedResponse, FetchError> {
        let scope_limit = self.per_scope_semaphore(scope).await;
        let _scope = scope_limit.acquire().await.expect("semaphore open");
        let _global = self.global_limit.acquire().await.expect("semaphore open");

        self.attempt_with_retries(url)
            .instrument(info_span!("http_fetch", %run_id, scope, url))
            .await
    }
}
