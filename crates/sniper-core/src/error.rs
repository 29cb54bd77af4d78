use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-level error kinds. Transport errors are classified into these at
/// the boundary of the component that owns the external call; they never
/// unwind a poll cycle.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Filter or tender violates a documented constraint; surfaced to the
    /// front-end, never enters the pipeline.
    #[error("input rejected: {0}")]
    InputRejected(String),

    /// HTTP 5xx, timeout, rate limit. Retried next cycle.
    #[error("transient external failure: {0}")]
    TransientExternal(String),

    /// Recipient unreachable for good. Escalates to the blocked flag.
    #[error("permanent external failure: {0}")]
    PermanentExternal(String),

    /// Duplicate delivery insert. The normal at-most-once signal, recovered
    /// by returning `AlreadyDelivered`.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Persistent backend is gone; the engine stops emitting notifications.
    #[error("fatal: {0}")]
    Fatal(String),
}

/// What the matcher does with a tender whose region could not be resolved
/// to a canonical federal subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullRegionPolicy {
    /// No bonus, no penalty.
    Pass,
    /// Score penalty of 20.
    #[default]
    Penalise,
    /// Hard reject.
    Reject,
}

impl NullRegionPolicy {
    pub const PENALTY: i32 = 20;
}

impl FromStr for NullRegionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pass" | "pass-through" => Ok(Self::Pass),
            "penalise" | "penalize" => Ok(Self::Penalise),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown null-region policy {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_both_spellings() {
        assert_eq!("penalise".parse::<NullRegionPolicy>().unwrap(), NullRegionPolicy::Penalise);
        assert_eq!("penalize".parse::<NullRegionPolicy>().unwrap(), NullRegionPolicy::Penalise);
        assert_eq!("pass".parse::<NullRegionPolicy>().unwrap(), NullRegionPolicy::Pass);
        assert!("maybe".parse::<NullRegionPolicy>().is_err());
    }
}
