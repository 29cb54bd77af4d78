//! Core domain model for the tender monitoring pipeline.

mod error;
mod filter;
mod report;
mod subscriber;
mod tender;

pub use error::{DomainError, NullRegionPolicy};
pub use filter::{FilterIntent, TenderFilter};
pub use report::{
    OracleAssessment, OracleDecision, RejectCause, ScoreBreakdown, ScoreReport, Verdict,
};
pub use subscriber::{QuietHours, Subscriber, Tier};
pub use tender::{EnrichedTender, LawType, RawTender, TenderType};

pub const CRATE_NAME: &str = "sniper-core";
