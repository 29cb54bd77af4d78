use serde::{Deserialize, Serialize};

/// Why a tender was short-circuited to score 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectCause {
    ExcludeKeyword,
    RegionMismatch,
    NullRegion,
    TypeMismatch,
    DeadlineTooClose,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Reject,
    Consider,
    Accept,
}

/// Deterministic component scores, kept for diagnostics and the rendered
/// notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub keywords: i32,
    pub price: i32,
    pub region: i32,
    pub negative_patterns: i32,
    pub strict_mode_applied: bool,
}

/// Outcome of scoring one (tender, filter) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Composite deterministic score, clipped to [0, 100].
    pub score: i32,
    pub verdict: Verdict,
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub reject_cause: Option<RejectCause>,
    #[serde(default)]
    pub oracle_confidence: Option<u8>,
    pub breakdown: ScoreBreakdown,
}

impl ScoreReport {
    pub fn rejected(cause: RejectCause) -> Self {
        Self {
            score: 0,
            verdict: Verdict::Reject,
            matched_keywords: Vec::new(),
            reject_cause: Some(cause),
            oracle_confidence: None,
            breakdown: ScoreBreakdown::default(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.reject_cause.is_some()
    }

    /// Deterministic score plus the oracle boost, clipped to 100.
    pub fn composite(&self, assessment: &OracleAssessment) -> i32 {
        (self.score + assessment.boost()).min(100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OracleDecision {
    Accept,
    Recheck,
    Reject,
    /// Quota exhausted, transport failure or oracle disabled. Never cached,
    /// never boosted, never treated as a positive confidence.
    Unknown,
}

/// Result of a relevance oracle consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleAssessment {
    pub confidence: Option<u8>,
    pub decision: OracleDecision,
}

impl OracleAssessment {
    pub const ACCEPT_THRESHOLD: u8 = 40;
    pub const REJECT_THRESHOLD: u8 = 25;

    pub fn unknown() -> Self {
        Self {
            confidence: None,
            decision: OracleDecision::Unknown,
        }
    }

    pub fn from_confidence(confidence: u8) -> Self {
        let confidence = confidence.min(100);
        let decision = if confidence >= Self::ACCEPT_THRESHOLD {
            OracleDecision::Accept
        } else if confidence < Self::REJECT_THRESHOLD {
            OracleDecision::Reject
        } else {
            OracleDecision::Recheck
        };
        Self {
            confidence: Some(confidence),
            decision,
        }
    }

    /// Pipeline-side score boost. UNKNOWN carries no boost: an exhausted
    /// quota must not inflate scores.
    pub fn boost(&self) -> i32 {
        match self.confidence {
            Some(c) if c >= 60 => 15,
            Some(c) if c >= 40 => 10,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_thresholds() {
        assert_eq!(OracleAssessment::from_confidence(72).decision, OracleDecision::Accept);
        assert_eq!(OracleAssessment::from_confidence(40).decision, OracleDecision::Accept);
        assert_eq!(OracleAssessment::from_confidence(30).decision, OracleDecision::Recheck);
        assert_eq!(OracleAssessment::from_confidence(10).decision, OracleDecision::Reject);
    }

    #[test]
    fn boost_tiers() {
        assert_eq!(OracleAssessment::from_confidence(72).boost(), 15);
        assert_eq!(OracleAssessment::from_confidence(60).boost(), 15);
        assert_eq!(OracleAssessment::from_confidence(45).boost(), 10);
        assert_eq!(OracleAssessment::from_confidence(39).boost(), 0);
        assert_eq!(OracleAssessment::unknown().boost(), 0);
    }

    #[test]
    fn composite_is_clipped() {
        let mut report = ScoreReport::rejected(RejectCause::Archived);
        report.reject_cause = None;
        report.score = 95;
        assert_eq!(report.composite(&OracleAssessment::from_confidence(80)), 100);
        assert_eq!(report.composite(&OracleAssessment::unknown()), 95);
    }
}
