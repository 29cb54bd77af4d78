use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::tender::{LawType, TenderType};

/// Subscriber-owned matching specification.
///
/// The pipeline only reads filters; creation and mutation belong to the
/// front-end. A filter with `is_active == false` or a soft-deletion
/// timestamp is never consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderFilter {
    pub id: i64,
    pub subscriber_id: i64,
    pub name: String,
    pub is_active: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    /// Keywords whose score contribution is doubled.
    #[serde(default)]
    pub primary_keywords: Vec<String>,
    #[serde(default)]
    pub secondary_keywords: Vec<String>,
    /// Canonical region names; empty means any region.
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub price_min: Option<f64>,
    #[serde(default)]
    pub price_max: Option<f64>,
    #[serde(default)]
    pub tender_types: Vec<TenderType>,
    #[serde(default)]
    pub law_type: LawType,
    /// Free-text description of what the subscriber is after, fed to the
    /// relevance oracle.
    #[serde(default)]
    pub ai_intent: Option<String>,
    /// Bumped whenever matching inputs change; part of the oracle cache key.
    #[serde(default)]
    pub ai_intent_version: i64,
    /// Precomputed synonym expansion of `keywords`.
    #[serde(default)]
    pub expanded_keywords: Vec<String>,
    #[serde(default)]
    pub min_deadline_days: i64,
    /// Alternative delivery chats; empty means the subscriber's own chat.
    #[serde(default)]
    pub notify_chat_ids: Vec<i64>,
}

impl TenderFilter {
    /// Rejects filters that must not enter the pipeline.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(DomainError::InputRejected(format!(
                "filter {:?} has no keywords",
                self.name
            )));
        }
        if let (Some(min), Some(max)) = (self.price_min, self.price_max) {
            if min > max {
                return Err(DomainError::InputRejected(format!(
                    "filter {:?} has price_min {} above price_max {}",
                    self.name, min, max
                )));
            }
        }
        if self.min_deadline_days < 0 {
            return Err(DomainError::InputRejected(format!(
                "filter {:?} has negative min_deadline_days",
                self.name
            )));
        }
        Ok(())
    }

    pub fn is_live(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    /// Weight applied to a keyword's contribution.
    pub fn keyword_weight(&self, keyword: &str) -> i32 {
        if self
            .primary_keywords
            .iter()
            .any(|p| p.eq_ignore_ascii_case(keyword) || p.to_lowercase() == keyword.to_lowercase())
        {
            2
        } else {
            1
        }
    }

    pub fn intent(&self) -> Option<FilterIntent> {
        self.ai_intent.as_ref().map(|text| FilterIntent {
            text: text.clone(),
            version: self.ai_intent_version,
        })
    }
}

/// Versioned verification intent handed to the relevance oracle. The
/// version participates in the oracle cache key so edited filters do not
/// reuse stale confidences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterIntent {
    pub text: String,
    pub version: i64,
}
