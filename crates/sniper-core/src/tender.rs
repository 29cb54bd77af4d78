use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Procurement object kind as declared by the feed or inferred client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenderType {
    Goods,
    Services,
    Works,
}

impl TenderType {
    /// Maps the feed's Russian labels onto the enum. Unknown labels yield `None`.
    pub fn from_feed_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "товары" | "поставка товаров" | "goods" => Some(Self::Goods),
            "услуги" | "оказание услуг" | "services" => Some(Self::Services),
            "работы" | "выполнение работ" | "works" => Some(Self::Works),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goods => "goods",
            Self::Services => "services",
            Self::Works => "works",
        }
    }
}

/// Legal regime a procurement was published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LawType {
    #[serde(rename = "44-FZ")]
    Fz44,
    #[serde(rename = "223-FZ")]
    Fz223,
    #[default]
    #[serde(rename = "any")]
    Any,
}

impl LawType {
    pub fn from_db(value: &str) -> Self {
        match value {
            "44-FZ" => Self::Fz44,
            "223-FZ" => Self::Fz223,
            _ => Self::Any,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fz44 => "44-FZ",
            Self::Fz223 => "223-FZ",
            Self::Any => "any",
        }
    }
}

/// Tender record as the feed surfaces it, before any detail-page fetch.
///
/// `number` is the procurement number and the only identity the pipeline
/// persists for dedup purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTender {
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub customer: String,
    #[serde(default)]
    pub customer_inn: Option<String>,
    /// Coarse price from the feed summary, when present.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub tender_type: Option<TenderType>,
    #[serde(default)]
    pub law_type: Option<LawType>,
    pub published_at: DateTime<Utc>,
    /// Submission deadline as surfaced by the feed summary (rarely present).
    #[serde(default)]
    pub deadline: Option<NaiveDateTime>,
    /// Free-text performance region from the feed, not yet normalised.
    #[serde(default)]
    pub region_hint: Option<String>,
    pub url: String,
}

/// Raw tender plus whatever the detail page yielded. Enrichment never fails
/// the pipeline: every field simply stays `None` when the page was
/// unreachable or unparseable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTender {
    pub raw: RawTender,
    /// Precise starting price from the detail page.
    #[serde(default)]
    pub price: Option<f64>,
    /// Canonical federal subject of the customer, or `None` when
    /// unresolvable. Garbage region text is never stored.
    #[serde(default)]
    pub customer_region: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDateTime>,
    /// Replacement title extracted from the page when the feed title was
    /// bureaucratic boilerplate or too short.
    #[serde(default)]
    pub enriched_title: Option<String>,
    /// Hash of the fetched detail page, for cache validation.
    #[serde(default)]
    pub page_fingerprint: Option<String>,
}

impl EnrichedTender {
    /// Wraps a raw tender with no detail-page data. Used when enrichment is
    /// skipped or degrades on timeout.
    pub fn from_raw(raw: RawTender) -> Self {
        Self {
            raw,
            price: None,
            customer_region: None,
            deadline: None,
            enriched_title: None,
            page_fingerprint: None,
        }
    }

    /// Detail-page price when known, feed price otherwise.
    pub fn effective_price(&self) -> Option<f64> {
        self.price.or(self.raw.price)
    }

    pub fn effective_deadline(&self) -> Option<NaiveDateTime> {
        self.deadline.or(self.raw.deadline)
    }

    pub fn effective_title(&self) -> &str {
        self.enriched_title.as_deref().unwrap_or(&self.raw.title)
    }

    /// Combined lowercased text the matcher scores against: title,
    /// description and the enriched title.
    pub fn searchable_text(&self) -> String {
        let mut text = self.raw.title.to_lowercase();
        if let Some(description) = &self.raw.description {
            text.push(' ');
            text.push_str(&description.to_lowercase());
        }
        if let Some(enriched) = &self.enriched_title {
            text.push(' ');
            text.push_str(&enriched.to_lowercase());
        }
        text
    }
}
