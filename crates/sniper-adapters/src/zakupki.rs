//! zakupki.gov.ru feed adapter: parameterised RSS search plus detail-page
//! enrichment. All extraction is regex over the feed's summary markup and
//! the notice card HTML; the upstream tolerates little load, so every
//! request goes through the paced fetcher and enrichment results persist
//! in the store cache.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use sniper_core::{EnrichedTender, LawType, RawTender, TenderType};
use sniper_regions::RegionRegistry;
use sniper_storage::{CacheKind, HttpFetcher, SniperStore};

use crate::{FeedError, FeedQuery, FeedSource};

/// Subject codes the feed's search API expects for region filtering.
const FEED_REGION_CODES: &[(&str, &str)] = &[
    ("Москва", "5277335"),
    ("Санкт-Петербург", "5277384"),
    ("Московская область", "5277327"),
    ("Краснодарский край", "5277304"),
    ("Свердловская область", "5277370"),
    ("Республика Татарстан", "5277358"),
    ("Нижегородская область", "5277336"),
    ("Новосибирская область", "5277340"),
    ("Ростовская область", "5277362"),
    ("Самарская область", "5277364"),
    ("Челябинская область", "5277387"),
    ("Красноярский край", "5277305"),
    ("Пермский край", "5277346"),
    ("Воронежская область", "5277297"),
    ("Волгоградская область", "5277293"),
    ("Республика Башкортостан", "5277287"),
    ("Саратовская область", "5277366"),
    ("Тюменская область", "5277375"),
    ("Оренбургская область", "5277343"),
    ("Омская область", "5277342"),
    ("Кемеровская область", "5277300"),
    ("Хабаровский край", "5277310"),
    ("Иркутская область", "5277299"),
    ("Ленинградская область", "5277316"),
    ("Алтайский край", "5277282"),
    ("Приморский край", "5277307"),
    ("Ульяновская область", "5277377"),
    ("Ставропольский край", "5277309"),
    ("Тульская область", "5277374"),
    ("Владимирская область", "5277292"),
    ("Ярославская область", "5277391"),
    ("Калужская область", "5277301"),
    ("Калининградская область", "5277302"),
    ("Томская область", "5277372"),
    ("Рязанская область", "5277363"),
    ("Тверская область", "5277371"),
    ("Липецкая область", "5277317"),
    ("Пензенская область", "5277345"),
    ("Курская область", "5277314"),
    ("Брянская область", "5277290"),
    ("Белгородская область", "5277288"),
    ("Архангельская область", "5277284"),
    ("Смоленская область", "5277368"),
    ("Вологодская область", "5277294"),
    ("Курганская область", "5277313"),
    ("Мурманская область", "5277331"),
    ("Орловская область", "5277344"),
    ("Тамбовская область", "5277369"),
    ("Новгородская область", "5277339"),
    ("Кировская область", "5277303"),
    ("Костромская область", "5277311"),
    ("Псковская область", "5277351"),
    ("Ивановская область", "5277298"),
    ("Амурская область", "5277283"),
    ("Астраханская область", "5277285"),
    ("Забайкальский край", "5277306"),
    ("Республика Крым", "9311040"),
    ("Севастополь", "9310785"),
];

/// Boilerplate produced when a notice is published under the simplified
/// procedure; such "titles" carry no information about the subject matter.
const BUREAUCRATIC_PHRASES: &[&str] = &[
    "в соответствии с",
    "статьи 93",
    "закона № 44",
    "закона №44",
    "осуществляемая в соответствии",
    "частью 12",
];

const GOODS_START_INDICATORS: &[&str] = &[
    "поставка", "закупка", "приобретение", "купля", "покупка", "снабжение",
];

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

const GOODS_INDICATORS: &[&str] = &[
    "поставка товар",
    "закупка товар",
    "приобретение товар",
    "поставка оборудования",
    "закупка оборудования",
    "поставка материал",
    "закупка материал",
];

const WORK_INDICATORS: &[&str] = &[
    "выполнение работ",
    "строительные работы",
    "ремонт",
    "строительство",
    "реконструкция",
];

const SERVICE_INDICATORS: &[&str] = &[
    "оказание услуг",
    "медицинские услуги",
    "консультирование",
    "услуги по",
    "сопровождение",
];

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item>(.*?)</item>").unwrap());
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<title>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</title>").unwrap()
});
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<link>\s*(.*?)\s*</link>").unwrap());
static PUBDATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<pubDate>\s*(.*?)\s*</pubDate>").unwrap());
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<description>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</description>").unwrap()
});
static REG_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"regNumber=([A-Za-z0-9]+)").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(\d+);").unwrap());

/// Purchase-object patterns in the summary, strongest first.
static PURCHASE_OBJECT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)<strong>\s*Наименование объекта закупки:\s*</strong>([^<]+)",
        r"(?i)Наименование объекта закупки:\s*</strong>([^<]+)",
        r"(?i)<strong>\s*Объект закупки:\s*</strong>([^<]+)",
        r"(?i)<strong>\s*Предмет (?:контракта|закупки):\s*</strong>([^<]+)",
        r"(?i)<strong>\s*Краткое описание:\s*</strong>([^<]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SUMMARY_PRICE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)Начальная.{0,60}?цена.{0,40}?контракта[:\s]*</strong>\s*([0-9\s.,]+)",
        r"(?i)НМЦК[:\s]+([0-9\s.,]+)",
        r"(?is)Начальная.{0,60}?цена[:\s]+([0-9\s.,]+)",
        r"(?is)Максимальная.{0,60}?цена[:\s]+([0-9\s.,]+)",
        r"(?i)цена контракта[:\s]+([0-9\s.,]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static CUSTOMER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)<strong>\s*Наименование Заказчика:?\s*</strong>([^<]+)",
        r"(?i)<strong>\s*Заказчик:?\s*</strong>([^<]+)",
        r"(?i)Заказчик:\s*([^<\n]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static INN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ИНН[:\s]*(?:</strong>\s*)?(\d{12}|\d{10})").unwrap());

static SUMMARY_DEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)(?:окончани[ея]\s+(?:срока\s+)?подачи\s+заявок|срок подачи заявок)[^0-9]{0,60}(\d{2}\.\d{2}\.\d{4})(?:\s+(\d{2}:\d{2}))?",
    )
    .unwrap()
});

/// НМЦК patterns in the notice card HTML.
static PAGE_PRICE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?is)Максимальное значение цены контракта\s*</span>\s*<span[^>]*class="section__info"[^>]*>\s*([0-9\s.,]+)"#,
        r"(?is)Начальная цена.{0,200}?cardMainInfo__content[^>]*>\s*([0-9\s.,]+)",
        r#"(?is)Начальная \(максимальная\) цена контракта.{0,200}?section__info[^>]*>\s*([0-9\s.,]+)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PAGE_DEADLINE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?is)Дата и время окончания срока подачи заявок\s*</span>\s*<span[^>]*class="section__info"[^>]*>\s*(\d{2}\.\d{2}\.\d{4})(?:\s+(\d{2}:\d{2}))?"#,
        r"(?is)окончания срока подачи заявок.{0,120}?(\d{2}\.\d{2}\.\d{4})(?:\s+(\d{2}:\d{2}))?",
        r"(?is)Окончание подачи заявок\s*</span>\s*<span[^>]*>\s*(\d{2}\.\d{2}\.\d{4})(?:\s+(\d{2}:\d{2}))?",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PAGE_ADDRESS_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?is)Почтовый адрес\s*</span>\s*<span[^>]*class="section__info"[^>]*>\s*([^<]+)"#,
        r#"(?is)Место нахождения\s*</span>\s*<span[^>]*class="section__info"[^>]*>\s*([^<]+)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PAGE_CUSTOMER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)Организация,\s*осуществляющая\s*размещение.{0,200}?cardMainInfo__content[^>]*>\s*(?:<a[^>]*>)?([^<]+)",
        r"(?is)Наименование.{0,80}?заказчика.{0,200}?section__info[^>]*>\s*([^<]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PAGE_OBJECT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?is)Наименование объекта закупки\s*</span>\s*<span[^>]*class="section__info"[^>]*>\s*([^<]+)"#,
        r#"(?is)cardMainInfo__title[^>]*>\s*Объект закупки\s*</span>\s*<span[^>]*cardMainInfo__content[^>]*>\s*([^<]+)"#,
        r"(?is)<td[^>]*>\s*Наименование объекта закупки\s*</td>\s*<td[^>]*>([^<]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Clone)]
pub struct ZakupkiConfig {
    pub base_url: String,
    /// Raw entries to consider per poll before client-side filtering.
    pub max_entries: usize,
}

impl Default for ZakupkiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://zakupki.gov.ru".to_string(),
            max_entries: 300,
        }
    }
}

/// Cached part of an enriched record. The raw feed fields are re-applied
/// fresh on every cycle so a stale cache never resurrects old feed data.
#[derive(Debug, Serialize, Deserialize)]
struct EnrichmentOverlay {
    price: Option<f64>,
    customer_region: Option<String>,
    deadline: Option<NaiveDateTime>,
    enriched_title: Option<String>,
    page_fingerprint: Option<String>,
}

impl EnrichmentOverlay {
    fn apply(self, raw: RawTender) -> EnrichedTender {
        EnrichedTender {
            raw,
            price: self.price,
            customer_region: self.customer_region,
            deadline: self.deadline,
            enriched_title: self.enriched_title,
            page_fingerprint: self.page_fingerprint,
        }
    }

    fn capture(enriched: &EnrichedTender) -> Self {
        Self {
            price: enriched.price,
            customer_region: enriched.customer_region.clone(),
            deadline: enriched.deadline,
            enriched_title: enriched.enriched_title.clone(),
            page_fingerprint: enriched.page_fingerprint.clone(),
        }
    }
}

pub struct ZakupkiFeed {
    fetcher: Arc<HttpFetcher>,
    regions: Arc<RegionRegistry>,
    store: SniperStore,
    config: ZakupkiConfig,
}

impl ZakupkiFeed {
    pub fn new(
        fetcher: Arc<HttpFetcher>,
        regions: Arc<RegionRegistry>,
        store: SniperStore,
        config: ZakupkiConfig,
    ) -> Self {
        Self {
            fetcher,
            regions,
            store,
            config,
        }
    }

    fn build_rss_url(&self, query: &FeedQuery) -> Result<String, FeedError> {
        let mut params: Vec<(&str, String)> = vec![
            ("morphology", "on".into()),
            ("search-filter", "Дате размещения".into()),
            ("sortDirection", "false".into()),
            ("sortBy", "UPDATE_DATE".into()),
            ("currencyIdGeneral", "-1".into()),
            // Active submission stage only; archives are guarded out anyway.
            ("af", "on".into()),
            ("ca", "on".into()),
        ];

        match query.law_type {
            LawType::Fz44 => params.push(("fz44", "on".into())),
            LawType::Fz223 => params.push(("fz223", "on".into())),
            LawType::Any => {
                params.push(("fz44", "on".into()));
                params.push(("fz223", "on".into()));
            }
        }

        if !query.keywords.is_empty() {
            params.push(("searchString", query.keywords.clone()));
        }
        if let Some(min) = query.price_min {
            params.push(("priceFromGeneral", format!("{}", min as i64)));
        }
        if let Some(max) = query.price_max {
            params.push(("priceToGeneral", format!("{}", max as i64)));
        }

        let codes: Vec<&str> = query
            .regions
            .iter()
            .filter_map(|region| {
                FEED_REGION_CODES
                    .iter()
                    .find(|(name, _)| name == region)
                    .map(|(_, code)| *code)
            })
            .collect();
        if !codes.is_empty() {
            params.push(("selectedSubjectsIdNameHidden", codes.join(",")));
        }

        // The feed misclassifies goods, so that filter stays client-side;
        // works and services are reliable server-side.
        match query.tender_type {
            Some(TenderType::Works) => params.push(("purchaseObjectTypeCode", "2".into())),
            Some(TenderType::Services) => params.push(("purchaseObjectTypeCode", "3".into())),
            Some(TenderType::Goods) | None => {}
        }

        let base = format!("{}/epz/order/extendedsearch/rss.html", self.config.base_url);
        let url = reqwest::Url::parse_with_params(&base, params.iter().map(|(k, v)| (*k, v.as_str())))
            .map_err(|err| FeedError::Payload(format!("building feed url: {err}")))?;
        Ok(url.to_string())
    }

    fn parse_entry(&self, item: &str) -> Option<RawTender> {
        let link = LINK_RE.captures(item)?.get(1)?.as_str().trim().to_string();
        let url = if link.starts_with("http") {
            link.clone()
        } else {
            format!("{}{}", self.config.base_url, link)
        };
        let number = REG_NUMBER_RE
            .captures(&link)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())?;

        let mut title = TITLE_RE
            .captures(item)
            .and_then(|c| c.get(1))
            .map(|m| unescape_html(m.as_str()))
            .unwrap_or_default();

        let summary = DESCRIPTION_RE
            .captures(item)
            .and_then(|c| c.get(1))
            .map(|m| unescape_html(m.as_str()))
            .unwrap_or_default();

        // The summary's purchase object beats the feed title, which is often
        // the registry number or simplified-procedure boilerplate.
        if let Some(purchase_object) = extract_first(&PURCHASE_OBJECT_RES, &summary)
            .filter(|text| is_informative_title(text))
        {
            title = purchase_object;
        }
        if title.trim().is_empty() {
            return None;
        }

        let published_at = PUBDATE_RE
            .captures(item)
            .and_then(|c| c.get(1))
            .and_then(|m| DateTime::parse_from_rfc2822(m.as_str().trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| {
                debug!(number = %number, "entry without parseable pubDate");
                Utc::now()
            });

        let customer = extract_first(&CUSTOMER_RES, &summary).unwrap_or_default();
        let customer_inn = INN_RE
            .captures(&summary)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let deadline = SUMMARY_DEADLINE_RE
            .captures(&summary)
            .and_then(|c| parse_deadline_captures(c.get(1), c.get(2)));

        Some(RawTender {
            number,
            title: title.trim().to_string(),
            description: Some(strip_tags(&summary)).filter(|s| !s.is_empty()),
            customer: customer.trim().to_string(),
            customer_inn,
            price: extract_first(&SUMMARY_PRICE_RES, &summary).and_then(|t| parse_price_text(&t)),
            tender_type: detect_tender_type(&summary),
            law_type: None,
            published_at,
            deadline,
            region_hint: None,
            url,
        })
    }

    fn passes_type_filter(&self, tender: &RawTender, wanted: Option<TenderType>) -> bool {
        let Some(wanted) = wanted else { return true };
        if let Some(declared) = tender.tender_type {
            return declared == wanted;
        }

        let title = tender.title.to_lowercase();
        let full_text = format!(
            "{} {}",
            title,
            tender.description.as_deref().unwrap_or("").to_lowercase()
        );
        match wanted {
            TenderType::Goods => {
                if GOODS_START_INDICATORS.iter().any(|i| title.starts_with(i)) {
                    return true;
                }
                !SERVICE_WORK_INDICATORS.iter().any(|i| title.contains(i))
            }
            TenderType::Services => !GOODS_INDICATORS
                .iter()
                .chain(WORK_INDICATORS)
                .any(|i| full_text.contains(i)),
            TenderType::Works => !GOODS_INDICATORS
                .iter()
                .chain(SERVICE_INDICATORS)
                .any(|i| full_text.contains(i)),
        }
    }

    /// Customer-name tail, then INN prefix, then the postal address block.
    fn resolve_region(&self, raw: &RawTender, page: Option<&str>) -> Option<String> {
        if !raw.customer.is_empty() {
            if let Some(region) = self.regions.normalise(&raw.customer) {
                return Some(region);
            }
        }
        if let Some(inn) = &raw.customer_inn {
            if let Some(region) = self.regions.from_inn(inn) {
                return Some(region);
            }
        }
        if let Some(hint) = &raw.region_hint {
            if let Some(region) = self.regions.normalise(hint) {
                return Some(region);
            }
        }
        if let Some(page) = page {
            if let Some(address) = extract_first(&PAGE_ADDRESS_RES, page) {
                if let Some(region) = self.regions.normalise(&address) {
                    return Some(region);
                }
            }
        }
        None
    }

    async fn fetch_page(&self, run_id: Uuid, url: &str) -> Option<String> {
        match self.fetcher.fetch_bytes(run_id, "detail", url).await {
            Ok(response) => Some(response.text()),
            Err(err) => {
                warn!(url, error = %err, "detail page fetch failed, keeping feed-level fields");
                None
            }
        }
    }
}

#[async_trait]
impl FeedSource for ZakupkiFeed {
    async fn poll(&self, query: &FeedQuery) -> Result<Vec<RawTender>, FeedError> {
        let run_id = Uuid::new_v4();
        let url = self.build_rss_url(query)?;
        let response = self.fetcher.fetch_bytes(run_id, "feed", &url).await?;
        let body = response.text();

        let mut tenders = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for item in ITEM_RE.captures_iter(&body).take(self.config.max_entries) {
            let Some(tender) = self.parse_entry(&item[1]) else {
                continue;
            };
            if !seen.insert(tender.number.clone()) {
                continue;
            }
            if !self.passes_type_filter(&tender, query.tender_type) {
                debug!(number = %tender.number, "dropped by client-side type filter");
                continue;
            }
            tenders.push(tender);
            if tenders.len() >= query.max_results {
                break;
            }
        }
        debug!(count = tenders.len(), url = %url, "feed poll parsed");
        Ok(tenders)
    }

    async fn enrich(&self, raw: &RawTender) -> EnrichedTender {
        let now = Utc::now();
        let run_id = Uuid::new_v4();

        // Restart-safe cache: only the overlay persists, the raw feed
        // fields are always current.
        if let Ok(Some(value)) = self
            .store
            .cache_get(CacheKind::Enrichment, &raw.number, now)
            .await
        {
            if let Ok(overlay) = serde_json::from_value::<EnrichmentOverlay>(value) {
                debug!(number = %raw.number, "enrichment cache hit");
                return overlay.apply(raw.clone());
            }
        }

        let Some(page) = self.fetch_page(run_id, &raw.url).await else {
            return EnrichedTender::from_raw(raw.clone());
        };

        let mut enriched = EnrichedTender::from_raw(raw.clone());
        enriched.price = extract_first(&PAGE_PRICE_RES, &page).and_then(|t| parse_price_text(&t));
        enriched.deadline = PAGE_DEADLINE_RES
            .iter()
            .find_map(|re| re.captures(&page))
            .and_then(|c| parse_deadline_captures(c.get(1), c.get(2)));
        enriched.page_fingerprint = Some(hex::encode(Sha256::digest(page.as_bytes())));

        // The card sometimes names the customer when the summary did not.
        let mut raw_for_region = raw.clone();
        if raw_for_region.customer.is_empty() {
            if let Some(customer) = extract_first(&PAGE_CUSTOMER_RES, &page) {
                raw_for_region.customer = customer.trim().to_string();
            }
        }
        enriched.customer_region = self.resolve_region(&raw_for_region, Some(&page));

        // Replace boilerplate or stub titles with the purchase object, also
        // trying the purchase-objects tab when the card itself has none.
        if !is_informative_title(&raw.title) {
            let mut object = extract_first(&PAGE_OBJECT_RES, &page);
            if object.as_deref().map(|o| o.trim().chars().count() <= 10).unwrap_or(true)
                && raw.url.contains("common-info.html")
            {
                let tab_url = raw.url.replace("common-info.html", "purchase-objects.html");
                if let Some(tab) = self.fetch_page(run_id, &tab_url).await {
                    object = extract_first(&PAGE_OBJECT_RES, &tab).or(object);
                }
            }
            enriched.enriched_title = object
                .map(|o| o.trim().to_string())
                .filter(|o| o.chars().count() > 10 && is_informative_title(o));
        }

        if let Ok(value) = serde_json::to_value(EnrichmentOverlay::capture(&enriched)) {
            if let Err(err) = self
                .store
                .cache_put(
                    CacheKind::Enrichment,
                    &raw.number,
                    &value,
                    CacheKind::Enrichment.default_ttl(),
                    now,
                )
                .await
            {
                warn!(number = %raw.number, error = %err, "enrichment cache write failed");
            }
        }

        enriched
    }
}

fn extract_first(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| collapse_whitespace(&unescape_html(m.as_str())))
            .filter(|s| !s.is_empty())
    })
}

/// Rejects empty, stub and simplified-procedure boilerplate titles.
fn is_informative_title(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < 10 {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    !BUREAUCRATIC_PHRASES.iter().any(|p| lowered.contains(p))
}

fn detect_tender_type(summary: &str) -> Option<TenderType> {
    let lowered = summary.to_lowercase();
    if lowered.contains("поставка товар") {
        Some(TenderType::Goods)
    } else if lowered.contains("выполнение работ") {
        Some(TenderType::Works)
    } else if lowered.contains("оказание услуг") {
        Some(TenderType::Services)
    } else {
        None
    }
}

/// "1 234 567,89" and "1234567.89" both parse; anything under 100 roubles
/// is regex noise, not a contract price.
fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let normalised = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    let price: f64 = normalised.trim_matches('.').parse().ok()?;
    (price > 100.0).then_some(price)
}

fn parse_deadline_captures(
    date: Option<regex::Match<'_>>,
    time: Option<regex::Match<'_>>,
) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date?.as_str(), "%d.%m.%Y").ok()?;
    let time = time
        .and_then(|m| NaiveTime::parse_from_str(m.as_str(), "%H:%M").ok())
        .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 0).expect("static time"));
    Some(date.and_time(time))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_tags(html: &str) -> String {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
    collapse_whitespace(&TAG_RE.replace_all(html, " "))
}

fn unescape_html(text: &str) -> String {
    let replaced = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&laquo;", "«")
        .replace("&raquo;", "»")
        .replace("&ndash;", "–")
        .replace("&mdash;", "—")
        .replace("&amp;", "&");
    NUMERIC_ENTITY_RE
        .replace_all(&replaced, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_text_variants_parse() {
        assert_eq!(parse_price_text("1 234 567,89"), Some(1_234_567.89));
        assert_eq!(parse_price_text("1234567.89"), Some(1_234_567.89));
        assert_eq!(parse_price_text("500 000"), Some(500_000.0));
        // Regex noise below the floor.
        assert_eq!(parse_price_text("44"), None);
        assert_eq!(parse_price_text(""), None);
    }

    #[test]
    fn unescape_handles_entities() {
        assert_eq!(unescape_html("&laquo;Ромашка&raquo;"), "«Ромашка»");
        assert_eq!(unescape_html("A &amp; B"), "A & B");
        assert_eq!(unescape_html("&#1040;"), "А");
    }

    #[test]
    fn summary_fields_extract() {
        let summary = r#"<strong>Наименование объекта закупки: </strong>Поставка ноутбуков для нужд учреждения<br/>
<strong>Наименование Заказчика: </strong>ГБУ г. Москва &laquo;Центр&raquo;, ИНН: 7701234567<br/>
<strong>Начальная (максимальная) цена контракта:</strong> 1 200 000,00
<strong>Дата окончания подачи заявок:</strong> 20.03.2026 10:00"#;

        assert_eq!(
            extract_first(&PURCHASE_OBJECT_RES, summary).as_deref(),
            Some("Поставка ноутбуков для нужд учреждения")
        );
        assert_eq!(
            extract_first(&CUSTOMER_RES, summary).as_deref(),
            Some("ГБУ г. Москва «Центр», ИНН: 7701234567")
        );
        assert_eq!(
            extract_first(&SUMMARY_PRICE_RES, summary).and_then(|t| parse_price_text(&t)),
            Some(1_200_000.0)
        );
        assert_eq!(
            INN_RE.captures(summary).unwrap().get(1).unwrap().as_str(),
            "7701234567"
        );
        let deadline = SUMMARY_DEADLINE_RE
            .captures(summary)
            .and_then(|c| parse_deadline_captures(c.get(1), c.get(2)))
            .unwrap();
        assert_eq!(
            deadline,
            NaiveDate::from_ymd_opt(2026, 3, 20)
                .unwrap()
                .and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
        );
    }

    #[test]
    fn bureaucratic_titles_are_rejected() {
        assert!(!is_informative_title(
            "Закупка, осуществляемая в соответствии со статьёй 93 Закона № 44-ФЗ"
        ));
        assert!(!is_informative_title("Лот 1"));
        assert!(is_informative_title("Поставка ноутбуков для нужд учреждения"));
    }

    #[test]
    fn deadline_without_time_defaults_to_end_of_day() {
        let summary = "<strong>Окончание подачи заявок:</strong> 15.04.2026";
        let deadline = SUMMARY_DEADLINE_RE
            .captures(summary)
            .and_then(|c| parse_deadline_captures(c.get(1), c.get(2)))
            .unwrap();
        assert_eq!(deadline.time(), NaiveTime::from_hms_opt(23, 59, 0).unwrap());
    }

    #[test]
    fn tender_type_detected_from_summary() {
        assert_eq!(
            detect_tender_type("<strong>Размещение:</strong> Поставка товаров"),
            Some(TenderType::Goods)
        );
        assert_eq!(
            detect_tender_type("Оказание услуг по уборке"),
            Some(TenderType::Services)
        );
        assert_eq!(detect_tender_type("что-то другое"), None);
    }

    async fn feed_for_tests() -> ZakupkiFeed {
        let fetcher = Arc::new(
            HttpFetcher::new(sniper_storage::HttpClientConfig::default()).unwrap(),
        );
        let store = SniperStore::connect_in_memory().await.unwrap();
        ZakupkiFeed::new(
            fetcher,
            Arc::new(RegionRegistry::new()),
            store,
            ZakupkiConfig::default(),
        )
    }

    #[tokio::test]
    async fn rss_items_parse_into_raw_tenders() {
        let feed = feed_for_tests().await;
        let item = r#"
<title>№ 0372100000126000001</title>
<link>https://zakupki.gov.ru/epz/order/notice/ea44/view/common-info.html?regNumber=0372100000126000001</link>
<pubDate>Tue, 10 Mar 2026 09:00:00 GMT</pubDate>
<description><![CDATA[<strong>Наименование объекта закупки: </strong>Поставка ноутбуков<br/>
<strong>Наименование Заказчика: </strong>ГБУ г. Москва<br/>
<strong>Начальная (максимальная) цена контракта:</strong> 1 200 000,00]]></description>
"#;
        let tender = feed.parse_entry(item).unwrap();
        assert_eq!(tender.number, "0372100000126000001");
        assert_eq!(tender.title, "Поставка ноутбуков");
        assert_eq!(tender.customer, "ГБУ г. Москва");
        assert_eq!(tender.price, Some(1_200_000.0));
        assert_eq!(tender.published_at.date_naive().to_string(), "2026-03-10");
    }

    #[tokio::test]
    async fn goods_filter_drops_service_titles() {
        let feed = feed_for_tests().await;
        let mut tender = RawTender {
            number: "1".into(),
            title: "Оказание услуг по техническому обслуживанию компьютеров".into(),
            description: None,
            customer: String::new(),
            customer_inn: None,
            price: None,
            tender_type: None,
            law_type: None,
            published_at: Utc::now(),
            deadline: None,
            region_hint: None,
            url: String::new(),
        };
        assert!(!feed.passes_type_filter(&tender, Some(TenderType::Goods)));

        tender.title = "Поставка компьютеров и работы по установке".into();
        assert!(feed.passes_type_filter(&tender, Some(TenderType::Goods)));

        // Declared types bypass the heuristics.
        tender.tender_type = Some(TenderType::Services);
        assert!(!feed.passes_type_filter(&tender, Some(TenderType::Goods)));
    }

    #[tokio::test]
    async fn region_resolution_prefers_customer_then_inn() {
        let feed = feed_for_tests().await;
        let mut tender = RawTender {
            number: "1".into(),
            title: "t".into(),
            description: None,
            customer: "Администрация Казани".into(),
            customer_inn: Some("7701234567".into()),
            price: None,
            tender_type: None,
            law_type: None,
            published_at: Utc::now(),
            deadline: None,
            region_hint: None,
            url: String::new(),
        };
        assert_eq!(
            feed.resolve_region(&tender, None).as_deref(),
            Some("Республика Татарстан")
        );

        tender.customer = "ООО Ромашка".into();
        assert_eq!(feed.resolve_region(&tender, None).as_deref(), Some("Москва"));

        tender.customer_inn = None;
        assert_eq!(feed.resolve_region(&tender, None), None);
    }

    #[test]
    fn feed_url_carries_the_search_parameters() {
        let fetcher = Arc::new(
            HttpFetcher::new(sniper_storage::HttpClientConfig::default()).unwrap(),
        );
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = rt.block_on(SniperStore::connect_in_memory()).unwrap();
        let feed = ZakupkiFeed::new(
            fetcher,
            Arc::new(RegionRegistry::new()),
            store,
            ZakupkiConfig::default(),
        );

        let query = FeedQuery {
            keywords: "ноутбук".into(),
            price_min: Some(500_000.0),
            price_max: Some(2_000_000.0),
            law_type: LawType::Fz44,
            tender_type: Some(TenderType::Goods),
            regions: vec!["Москва".to_string()],
            max_results: 50,
        };
        let url = feed.build_rss_url(&query).unwrap();
        assert!(url.contains("fz44=on"));
        assert!(!url.contains("fz223=on"));
        assert!(url.contains("priceFromGeneral=500000"));
        assert!(url.contains("priceToGeneral=2000000"));
        assert!(url.contains("selectedSubjectsIdNameHidden=5277335"));
        // Goods stay client-side.
        assert!(!url.contains("purchaseObjectTypeCode"));

        let query = FeedQuery {
            tender_type: Some(TenderType::Services),
            ..query
        };
        let url = feed.build_rss_url(&query).unwrap();
        assert!(url.contains("purchaseObjectTypeCode=3"));
    }
}
