//! Telegram Bot API notification sink. Renders the short rich-text
//! message with inline actions and maps API failures onto the
//! transient/permanent split the ledger relies on.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use sniper_core::{EnrichedTender, ScoreReport, Subscriber};

use crate::{NotificationSink, SendOutcome};

#[derive(Debug, Clone)]
pub struct TelegramSinkConfig {
    pub api_base: String,
    pub bot_token: String,
    pub timeout: Duration,
}

impl TelegramSinkConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: bot_token.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramSink {
    client: reqwest::Client,
    config: TelegramSinkConfig,
}

impl TelegramSink {
    pub fn new(config: TelegramSinkConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base, self.config.bot_token
        )
    }
}

/// Error descriptions that mean the recipient is gone for good.
const PERMANENT_MARKERS: &[&str] = &[
    "bot was blocked",
    "user is deactivated",
    "chat not found",
    "bot can't initiate conversation",
    "kicked",
];

fn classify_api_error(status: reqwest::StatusCode, description: &str) -> SendOutcome {
    let description_l = description.to_lowercase();
    if status == reqwest::StatusCode::FORBIDDEN
        || PERMANENT_MARKERS.iter().any(|m| description_l.contains(m))
    {
        return SendOutcome::Permanent(description.to_string());
    }
    SendOutcome::Transient(format!("{status}: {description}"))
}

/// Short rich-text notification body: what matched, for how much, where,
/// until when, and why the pipeline considers it relevant.
pub fn format_notification(
    tender: &EnrichedTender,
    report: &ScoreReport,
    filter_name: &str,
) -> String {
    let mut lines = vec![format!(
        "🔔 <b>{}</b>",
        escape_html(tender.effective_title())
    )];

    if let Some(price) = tender.effective_price() {
        lines.push(format!("💰 НМЦК: {} ₽", format_price(price)));
    }
    if let Some(region) = &tender.customer_region {
        lines.push(format!("📍 Регион: {}", escape_html(region)));
    }
    if !tender.raw.customer.is_empty() {
        lines.push(format!("🏢 Заказчик: {}", escape_html(&tender.raw.customer)));
    }
    if let Some(deadline) = tender.effective_deadline() {
        lines.push(format!("⏰ Подача заявок до {}", deadline.format("%d.%m.%Y %H:%M")));
    }

    let mut relevance = format!("🎯 Совпадение: {}/100", report.score);
    if let Some(confidence) = report.oracle_confidence {
        relevance.push_str(&format!(" (AI: {confidence}%)"));
    }
    lines.push(relevance);

    if !report.matched_keywords.is_empty() {
        lines.push(format!(
            "🔑 {}",
            escape_html(&report.matched_keywords.join(", "))
        ));
    }
    lines.push(format!("📂 Фильтр: {}", escape_html(filter_name)));
    lines.join("\n")
}

fn format_price(price: f64) -> String {
    let whole = price.trunc() as i64;
    let digits: Vec<char> = whole.to_string().chars().rev().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*c);
    }
    grouped.chars().rev().collect()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(
        &self,
        _subscriber: &Subscriber,
        chat_id: i64,
        tender: &EnrichedTender,
        report: &ScoreReport,
        filter_name: &str,
    ) -> SendOutcome {
        let text = format_notification(tender, report, filter_name);
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
            "reply_markup": {
                "inline_keyboard": [
                    [{ "text": "Открыть", "url": tender.raw.url }],
                    [
                        { "text": "Интересно", "callback_data": format!("fb:interested:{}", tender.raw.number) },
                        { "text": "Пропустить", "callback_data": format!("fb:skip:{}", tender.raw.number) },
                        { "text": "Скрыть", "callback_data": format!("fb:hide:{}", tender.raw.number) }
                    ]
                ]
            }
        });

        let response = match self
            .client
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(chat_id, error = %err, "sink transport error");
                return SendOutcome::Transient(err.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!(chat_id, tender = %tender.raw.number, "notification sent");
            return SendOutcome::Sent;
        }

        let description = response
            .json::<ApiReply>()
            .await
            .ok()
            .filter(|reply| !reply.ok)
            .and_then(|reply| reply.description)
            .unwrap_or_default();
        classify_api_error(status, &description)
    }
}
