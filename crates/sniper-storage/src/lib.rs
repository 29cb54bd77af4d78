//! Persistence and HTTP plumbing: the SQLite store behind the delivery
//! ledger, quota gate, TTL cache and the subscriber/filter repository, plus
//! the shared HTTP fetcher.

mod cache;
mod filters;
mod http;
mod ledger;
mod quota;
mod store;
mod subscribers;

pub use cache::CacheKind;
pub use http::{FetchError, FetchedResponse, HttpClientConfig, HttpFetcher, RetryPolicy};
pub use ledger::{AbandonCause, Reservation, ReserveOutcome};
pub use quota::QuotaResource;
pub use store::{SniperStore, StoreError};

pub const CRATE_NAME: &str = "sniper-storage";
