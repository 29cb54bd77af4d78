//! Deterministic scoring of tenders against subscriber filters.
//!
//! The same algorithm runs twice per tender: a pre-score pass over the
//! feed-level fields, gating whether detail-page enrichment is worth the
//! HTTP round-trip, and a full pass once price, region and deadline are
//! known. Rejects short-circuit to score 0 with a cause.

mod rules;

use chrono::{DateTime, Utc};
use sniper_core::{
    EnrichedTender, NullRegionPolicy, RawTender, RejectCause, ScoreBreakdown, ScoreReport,
    TenderFilter, TenderType, Verdict,
};
use tracing::debug;

pub use rules::{MatcherRules, RulesError};

/// Score contributions, per the scoring table.
const COMPOUND_PHRASE_SCORE: i32 = 35;
const EXACT_WORD_SCORE: i32 = 25;
const ROOT_MATCH_SCORE: i32 = 18;
const SYNONYM_SCORE: i32 = 20;
const PRICE_IN_BAND_SCORE: i32 = 20;
const PRICE_NEAR_BAND_SCORE: i32 = 10;
const PRICE_OUT_OF_BAND_PENALTY: i32 = -20;
const REGION_BONUS: i32 = 10;
const NEGATIVE_PATTERN_PENALTY: i32 = -5;
const NEGATIVE_PATTERN_FLOOR: i32 = -30;
/// Positive contributions shrink to 60% when a wide filter barely matches.
const STRICT_MODE_FACTOR: f64 = 0.6;
const STRICT_MODE_MIN_KEYWORDS: usize = 8;
const STRICT_MODE_MATCH_RATIO: f64 = 0.1;
const ACCEPT_SCORE: i32 = 70;

/// Titles starting with these words are goods even when the feed left the
/// type blank.
const GOODS_START_INDICATORS: &[&str] = &[
    "поставка",
    "закупка",
    "приобретение",
    "купля",
    "покупка",
    "снабжение",
];

/// Title markers of services/works that leak into goods queries. The feed
/// misclassifies goods routinely, so the check runs against the title only.
const SERVICE_WORK_INDICATORS: &[&str] = &[
    "оказание услуг",
    "оказание услуги",
    "выполнение работ",
    "выполнение услуг",
    "проведение работ",
    "услуги по",
    "работы по",
    "медицинские услуги",
    "медицинская помощь",
    "консультирование",
    "проектирование",
    "техническое обслуживание",
    "техобслуживание",
    "сервисное обслуживание",
];

#[derive(Debug, Clone, Copy)]
enum RegionInput<'a> {
    /// Pre-score pass: enrichment has not run yet, region is out of scope.
    NotYetKnown,
    /// Enrichment ran but could not resolve a canonical subject.
    Unresolved,
    Known(&'a str),
}

pub struct SmartMatcher {
    rules: MatcherRules,
    null_region_policy: NullRegionPolicy,
}

impl SmartMatcher {
    pub fn new(rules: MatcherRules, null_region_policy: NullRegionPolicy) -> Self {
        Self {
            rules,
            null_region_policy,
        }
    }

    /// Pre-enrichment pass: keyword and title-derived signals only.
    pub fn pre_score(&self, tender: &RawTender, filter: &TenderFilter) -> ScoreReport {
        let mut text = tender.title.to_lowercase();
        if let Some(description) = &tender.description {
            text.push(' ');
            text.push_str(&description.to_lowercase());
        }
        self.score(
            &text,
            &tender.title,
            tender.tender_type,
            filter,
            None,
            RegionInput::NotYetKnown,
            None,
        )
    }

    /// Post-enrichment pass with price, region and deadline decisions.
    pub fn full_score(
        &self,
        tender: &EnrichedTender,
        filter: &TenderFilter,
        now: DateTime<Utc>,
    ) -> ScoreReport {
        let text = tender.searchable_text();
        let region = match &tender.customer_region {
            Some(region) => RegionInput::Known(region),
            None => RegionInput::Unresolved,
        };
        let deadline_days = tender
            .effective_deadline()
            .map(|deadline| (deadline.date() - now.date_naive()).num_days());
        self.score(
            &text,
            tender.effective_title(),
            tender.raw.tender_type,
            filter,
            tender.effective_price(),
            region,
            deadline_days,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn score(
        &self,
        text: &str,
        title: &str,
        declared_type: Option<TenderType>,
        filter: &TenderFilter,
        price: Option<f64>,
        region: RegionInput<'_>,
        deadline_days: Option<i64>,
    ) -> ScoreReport {
        // Hard gates first; none of them consume any scoring work.
        for exclude in &filter.exclude_keywords {
            let exclude = exclude.trim().to_lowercase();
            if exclude.is_empty() {
                continue;
            }
            let hit = if exclude.chars().count() < 4 {
                contains_word(text, &exclude)
            } else {
                text.contains(&exclude)
            };
            if hit {
                debug!(filter = %filter.name, keyword = %exclude, "excluded by keyword");
                return ScoreReport::rejected(RejectCause::ExcludeKeyword);
            }
        }

        if let Some(cause) = type_decision(declared_type, title, &filter.tender_types) {
            return ScoreReport::rejected(cause);
        }

        let region_component = match region_decision(region, filter, self.null_region_policy) {
            Ok(component) => component,
            Err(cause) => return ScoreReport::rejected(cause),
        };

        if let Some(days) = deadline_days {
            if days < filter.min_deadline_days {
                return ScoreReport::rejected(RejectCause::DeadlineTooClose);
            }
        }

        let keyword_outcome = self.score_keywords(text, filter);
        let price_component = price_component(price, filter.price_min, filter.price_max);
        let negative_component = self.negative_penalty(text);

        let mut positives = keyword_outcome.score;
        if region_component > 0 {
            positives += region_component;
        }
        if price_component > 0 {
            positives += price_component;
        }

        let strict = filter.keywords.len() >= STRICT_MODE_MIN_KEYWORDS
            && (keyword_outcome.matched_filter_keywords as f64)
                < (filter.keywords.len() as f64) * STRICT_MODE_MATCH_RATIO;
        if strict {
            positives = (positives as f64 * STRICT_MODE_FACTOR).round() as i32;
        }

        let mut total = positives + negative_component;
        if region_component < 0 {
            total += region_component;
        }
        if price_component < 0 {
            total += price_component;
        }
        let score = total.clamp(0, 100);

        ScoreReport {
            score,
            verdict: if score >= ACCEPT_SCORE {
                Verdict::Accept
            } else {
                Verdict::Consider
            },
            matched_keywords: keyword_outcome.matched,
            reject_cause: None,
            oracle_confidence: None,
            breakdown: ScoreBreakdown {
                keywords: keyword_outcome.score,
                price: price_component,
                region: region_component,
                negative_patterns: negative_component,
                strict_mode_applied: strict,
            },
        }
    }

    fn score_keywords(&self, text: &str, filter: &TenderFilter) -> KeywordOutcome {
        let mut outcome = KeywordOutcome::default();

        for keyword in &filter.keywords {
            let keyword_l = keyword.trim().to_lowercase();
            if keyword_l.is_empty() {
                continue;
            }
            let weight = filter.keyword_weight(&keyword_l);
            let char_count = keyword_l.chars().count();

            if char_count < 3 {
                // Whitelisted short keywords match word-exact only; they must
                // never fire as the root of a longer word.
                if self.rules.is_whitelisted_short(&keyword_l)
                    && contains_word(text, &keyword_l)
                {
                    outcome.hit(EXACT_WORD_SCORE * weight, keyword.clone());
                }
                continue;
            }

            if self.rules.is_stop_word(&keyword_l) {
                continue;
            }

            if keyword_l.contains(' ') {
                if contains_word(text, &keyword_l) {
                    outcome.hit(COMPOUND_PHRASE_SCORE * weight, keyword.clone());
                    continue;
                }
            } else {
                if contains_word(text, &keyword_l) {
                    outcome.hit(EXACT_WORD_SCORE * weight, keyword.clone());
                    continue;
                }
                if char_count >= 5 {
                    let root_len = char_count.saturating_sub(2).max(5);
                    let root: String = keyword_l.chars().take(root_len).collect();
                    if contains_root(text, &root) {
                        outcome.hit(ROOT_MATCH_SCORE * weight, format!("{keyword} (по корню)"));
                        continue;
                    }
                }
            }

            if let Some(synonyms) = self.rules.synonyms.get(&keyword_l) {
                for synonym in synonyms {
                    let synonym_l = synonym.to_lowercase();
                    if contains_word(text, &synonym_l) {
                        outcome.hit(
                            SYNONYM_SCORE * weight,
                            format!("{keyword} (синоним: {synonym})"),
                        );
                        break;
                    }
                }
            }
        }

        // The filter-level expansion set contributes at synonym tier, once
        // per expanded term, without attributing to a specific keyword.
        for expanded in &filter.expanded_keywords {
            let expanded_l = expanded.trim().to_lowercase();
            if expanded_l.chars().count() < 3
                || self.rules.is_stop_word(&expanded_l)
                || filter
                    .keywords
                    .iter()
                    .any(|k| k.to_lowercase() == expanded_l)
            {
                continue;
            }
            if contains_word(text, &expanded_l) {
                outcome.score += SYNONYM_SCORE;
                outcome.matched.push(format!("{expanded} (расширение)"));
            }
        }

        outcome
    }

    fn negative_penalty(&self, text: &str) -> i32 {
        let mut penalty = 0;
        for pattern in &self.rules.negative_patterns {
            if text.contains(pattern.as_str()) {
                penalty += NEGATIVE_PATTERN_PENALTY;
                if penalty <= NEGATIVE_PATTERN_FLOOR {
                    return NEGATIVE_PATTERN_FLOOR;
                }
            }
        }
        penalty
    }
}

#[derive(Default)]
struct KeywordOutcome {
    score: i32,
    matched: Vec<String>,
    /// Distinct filter keywords that matched, for the strict-mode ratio.
    matched_filter_keywords: usize,
}

impl KeywordOutcome {
    fn hit(&mut self, score: i32, label: String) {
        self.score += score;
        self.matched.push(label);
        self.matched_filter_keywords += 1;
    }
}

fn type_decision(
    declared: Option<TenderType>,
    title: &str,
    wanted: &[TenderType],
) -> Option<RejectCause> {
    if wanted.is_empty() {
        return None;
    }
    match declared {
        Some(declared) if !wanted.contains(&declared) => Some(RejectCause::TypeMismatch),
        Some(_) => None,
        None => {
            // The feed misdeclares goods; when only goods are wanted and the
            // type is blank, a service-shaped title is rejected unless the
            // title opens with a goods word.
            if matches!(wanted, [TenderType::Goods]) {
                let title_l = title.to_lowercase();
                let opens_as_goods = GOODS_START_INDICATORS
                    .iter()
                    .any(|indicator| title_l.starts_with(indicator));
                if !opens_as_goods
                    && SERVICE_WORK_INDICATORS
                        .iter()
                        .any(|indicator| title_l.contains(indicator))
                {
                    return Some(RejectCause::TypeMismatch);
                }
            }
            None
        }
    }
}

fn region_decision(
    region: RegionInput<'_>,
    filter: &TenderFilter,
    policy: NullRegionPolicy,
) -> Result<i32, RejectCause> {
    if filter.regions.is_empty() {
        return Ok(0);
    }
    match region {
        RegionInput::NotYetKnown => Ok(0),
        RegionInput::Known(region) => {
            if filter.regions.iter().any(|r| r == region) {
                Ok(REGION_BONUS)
            } else {
                Err(RejectCause::RegionMismatch)
            }
        }
        RegionInput::Unresolved => match policy {
            NullRegionPolicy::Pass => Ok(0),
            NullRegionPolicy::Penalise => Ok(-NullRegionPolicy::PENALTY),
            NullRegionPolicy::Reject => Err(RejectCause::NullRegion),
        },
    }
}

fn price_component(price: Option<f64>, min: Option<f64>, max: Option<f64>) -> i32 {
    let Some(price) = price else { return 0 };
    if min.is_none() && max.is_none() {
        return 0;
    }

    let below = min.map(|min| price < min).unwrap_or(false);
    let above = max.map(|max| price > max).unwrap_or(false);
    if !below && !above {
        return PRICE_IN_BAND_SCORE;
    }
    if below {
        let min = min.expect("below implies min");
        if price >= min * 0.8 {
            return PRICE_NEAR_BAND_SCORE;
        }
    }
    if above {
        let max = max.expect("above implies max");
        if price <= max * 1.2 {
            return PRICE_NEAR_BAND_SCORE;
        }
    }
    PRICE_OUT_OF_BAND_PENALTY
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Substring match with word boundaries on both ends. Works for phrases
/// since interior spaces match literally.
fn contains_word(text: &str, needle: &str) -> bool {
    for (index, _) in text.match_indices(needle) {
        let before_ok = text[..index]
            .chars()
            .next_back()
            .map(|c| !is_word_char(c))
            .unwrap_or(true);
        let after_ok = text[index + needle.len()..]
            .chars()
            .next()
            .map(|c| !is_word_char(c))
            .unwrap_or(true);
        if before_ok && after_ok {
            return true;
        }
    }
    false
}

/// Match a stem at the start of a word; the tail may continue.
fn contains_root(text: &str, root: &str) -> bool {
    for (index, _) in text.match_indices(root) {
        let before_ok = text[..index]
            .chars()
            .next_back()
            .map(|c| !is_word_char(c))
            .unwrap_or(true);
        if before_ok {
            return true;
        }
    }
    false
}
