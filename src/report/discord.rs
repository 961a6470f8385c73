//! Discord webhook margin reports.
//!
//! [`build_embed`] is pure: it turns a product, the user's prices and the
//! current tags into the embed Discord renders. [`DiscordReporter`] posts it.

use super::{http_client, ReportError};
use crate::amazon::marketplaces::{country_flag, find_by_url, Marketplace};
use crate::amazon::models::ProductRecord;
use crate::store::TagMapping;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wreq::Client;

/// Embed accent colour.
pub const EMBED_COLOR: u32 = 15380232;

/// Discord's title length limit, in characters.
pub const MAX_TITLE_CHARS: usize = 256;

const CURRENCY: &str = "€";

/// Prices and destination market entered for a margin report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordOrder {
    pub buy_price: Option<f64>,
    pub sell_price: Option<f64>,
    pub sell_country: String,
}

impl DiscordOrder {
    /// Creates an order from already parsed prices.
    pub fn new(buy_price: f64, sell_price: f64, sell_country: impl Into<String>) -> Self {
        Self { buy_price: Some(buy_price), sell_price: Some(sell_price), sell_country: sell_country.into() }
    }

    /// Checks the order and returns `(buy, sell)`.
    pub fn validate(&self) -> Result<(f64, f64), ReportError> {
        let sell = self.sell_price.filter(|p| p.is_finite()).ok_or(ReportError::InvalidSellPrice)?;
        let buy = self
            .buy_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or(ReportError::InvalidBuyPrice)?;
        if self.sell_country.trim().is_empty() {
            return Err(ReportError::MissingSellCountry);
        }
        Ok((buy, sell))
    }
}

/// Parses a user-entered price like a browser's `parseFloat`: the longest
/// leading number wins and trailing text is ignored. `,` is read as the
/// decimal separator.
pub fn parse_price(input: &str) -> Option<f64> {
    let normalized = input.trim().replace(',', ".");
    let bytes = normalized.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - end - 1;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    normalized[..end].parse::<f64>().ok().filter(|p| p.is_finite())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// A Discord embed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
    pub timestamp: String,
}

/// Webhook request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

fn field(name: impl Into<String>, value: impl Into<String>) -> EmbedField {
    EmbedField { name: name.into(), value: value.into(), inline: true }
}

fn signed(amount: f64) -> String {
    if amount >= 0.0 {
        format!("+{:.2}", amount)
    } else {
        format!("{:.2}", amount)
    }
}

/// Builds the margin embed for `product`.
///
/// The link is the tagged canonical product URL when the product's
/// marketplace has a tag, otherwise the captured URL.
pub fn build_embed(
    product: &ProductRecord,
    order: &DiscordOrder,
    marketplaces: &[Marketplace],
    tags: &TagMapping,
    now: DateTime<Utc>,
) -> Result<Embed, ReportError> {
    let (buy, sell) = order.validate()?;

    let source = find_by_url(marketplaces, &product.product_url);
    let buy_flag = source.map(|m| m.flag()).unwrap_or_else(|| country_flag(""));
    let sell_flag = country_flag(order.sell_country.trim());

    let url = match source.and_then(|m| tags.tag_for(&m.id).map(|tag| (m, tag))) {
        Some((marketplace, tag)) if !product.asin.is_empty() => {
            marketplace.tagged_product_url(&product.asin, tag)
        }
        _ => product.product_url.clone(),
    };

    let profit = sell - buy;
    let margin = profit / buy * 100.0;

    let thumbnail = (!product.thumbnail_url.is_empty())
        .then(|| EmbedImage { url: product.thumbnail_url.clone() });

    Ok(Embed {
        title: product.display_name().chars().take(MAX_TITLE_CHARS).collect(),
        url: url.clone(),
        color: EMBED_COLOR,
        thumbnail,
        fields: vec![
            field("ASIN", product.asin.clone()),
            field(format!("{} Buy", buy_flag), format!("[{:.2}{}]({})", buy, CURRENCY, url)),
            field(format!("{} Sell", sell_flag), format!("{:.2}{}", sell, CURRENCY)),
            field(
                "💰 Margin",
                format!("{:.1}% | {}{}/unit", margin, signed(profit), CURRENCY),
            ),
        ],
        footer: EmbedFooter {
            text: format!("Profit: {}{} ({:.1}%)", signed(profit), CURRENCY, margin),
        },
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Posts embeds to a Discord webhook.
pub struct DiscordReporter {
    client: Client,
}

impl DiscordReporter {
    /// Creates a reporter with the given request timeout.
    pub fn new(timeout_secs: u64) -> Result<Self, ReportError> {
        Ok(Self { client: http_client(timeout_secs)? })
    }

    /// Sends one embed; non-2xx responses become [`ReportError::Discord`].
    pub async fn send(&self, webhook_url: &str, embed: Embed) -> Result<(), ReportError> {
        let payload = WebhookPayload { embeds: vec![embed] };
        let body = serde_json::to_string(&payload)?;
        debug!("Discord webhook request: {}", body);

        let response = self
            .client
            .post(webhook_url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Discord { status: status.as_u16(), body });
        }

        info!("Discord report sent ({})", status);
        Ok(())
    }
}
