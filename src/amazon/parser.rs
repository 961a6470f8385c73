//! HTML parser for Amazon product pages.

use crate::amazon::models::ProductRecord;
use crate::amazon::selectors::{errors, product};
use anyhow::{Context, Result};
use regex_lite::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;
use tracing::{debug, trace};
use url::Url;

/// Product-detail path segment: `dp/<ASIN>` or `gp/product/<ASIN>`.
static ASIN_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:dp|gp/product)/([A-Z0-9]{10})(?:[/?#]|$)").unwrap()
});

/// Label of the overview row holding the brand.
const BRAND_ROW_LABEL: &str = "Brand Name";

/// Extracts the ASIN from a product page URL.
///
/// Only the path is inspected, so an ASIN-like query value is never picked up.
pub fn asin_from_url(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    ASIN_PATH.captures(&path).map(|caps| caps[1].to_uppercase())
}

/// Parser for Amazon product pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser;

impl Parser {
    /// Creates a new parser.
    pub fn new() -> Self {
        Self
    }

    /// Parses a product page into a [`ProductRecord`].
    ///
    /// The ASIN comes from `page_url`; every other field is optional and
    /// left empty when the page does not carry it.
    pub fn parse_product_page(&self, html: &str, page_url: &str) -> Result<ProductRecord> {
        let asin = asin_from_url(page_url)
            .with_context(|| format!("No ASIN found in URL: {}", page_url))?;

        let document = Html::parse_document(html);
        self.check_for_errors(&document)?;

        let record = ProductRecord {
            asin,
            product_name: self.title(&document).unwrap_or_default(),
            thumbnail_url: self.thumbnail(&document).unwrap_or_default(),
            product_url: page_url.to_string(),
            description: self.description(&document).unwrap_or_default(),
            brand: self.brand(&document).unwrap_or_default(),
            buy_price: None,
            sell_price: None,
        };

        debug!("Parsed product {} ({})", record.asin, record.display_name());
        Ok(record)
    }

    /// Returns the ASIN the page itself reports through its hidden input.
    pub fn page_asin(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&product::ASIN_INPUT)
            .next()
            .and_then(|e| e.value().attr("value"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Returns true once the page shows a non-empty product title.
    pub fn has_title(&self, html: &str) -> bool {
        self.title(&Html::parse_document(html)).is_some()
    }

    /// Checks for CAPTCHA or error pages.
    fn check_for_errors(&self, document: &Html) -> Result<()> {
        if document.select(&errors::CAPTCHA).next().is_some() {
            anyhow::bail!(
                "CAPTCHA detected. Amazon is blocking requests. \
                Try using a proxy or waiting before retrying."
            );
        }

        if document.select(&errors::DOG_PAGE).next().is_some() {
            anyhow::bail!(
                "Amazon error page detected (503). \
                The service may be temporarily unavailable."
            );
        }

        Ok(())
    }

    fn title(&self, document: &Html) -> Option<String> {
        document.select(&product::TITLE).next().map(text_of).filter(|t| !t.is_empty())
    }

    fn thumbnail(&self, document: &Html) -> Option<String> {
        let src = |e: ElementRef| e.value().attr("src").map(String::from);

        document
            .select(&product::IMAGE)
            .next()
            .and_then(src)
            .filter(|s| !s.is_empty())
            .or_else(|| document.select(&product::IMAGE_FALLBACK).next().and_then(src))
    }

    fn description(&self, document: &Html) -> Option<String> {
        document.select(&product::FEATURE_BULLET).next().map(text_of)
    }

    fn brand(&self, document: &Html) -> Option<String> {
        let row = document
            .select(&product::OVERVIEW_ROW)
            .find(|row| row.text().collect::<String>().contains(BRAND_ROW_LABEL))?;

        trace!("Found brand row");
        row.select(&product::OVERVIEW_VALUE).next().map(text_of)
    }
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
