//! Data models for captured Amazon products.

use serde::{Deserialize, Serialize};

/// Product data captured from a single product page visit.
///
/// Serialized in camelCase; this is the JSON body posted to the product API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Amazon Standard Identification Number
    pub asin: String,
    /// Product title (empty if not found on the page)
    #[serde(default)]
    pub product_name: String,
    /// Main product image URL
    #[serde(default)]
    pub thumbnail_url: String,
    /// URL of the page the product was captured from
    #[serde(default)]
    pub product_url: String,
    /// First feature bullet
    #[serde(default)]
    pub description: String,
    /// Brand name from the product overview table
    #[serde(default)]
    pub brand: String,
    /// User-entered buy price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_price: Option<f64>,
    /// User-entered sell price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<f64>,
}

impl ProductRecord {
    /// Creates a record with only the ASIN and page URL set.
    pub fn new(asin: impl Into<String>, product_url: impl Into<String>) -> Self {
        Self { asin: asin.into(), product_url: product_url.into(), ..Default::default() }
    }

    /// Returns the product name, falling back to the ASIN.
    pub fn display_name(&self) -> &str {
        if self.product_name.is_empty() {
            &self.asin
        } else {
            &self.product_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_serialization() {
        let record = ProductRecord {
            asin: "B0CTHXMYL8".to_string(),
            product_name: "Widget".to_string(),
            thumbnail_url: "https://m.media-amazon.com/images/I/x.jpg".to_string(),
            product_url: "https://www.amazon.de/dp/B0CTHXMYL8".to_string(),
            description: "Does things".to_string(),
            brand: "Acme".to_string(),
            buy_price: None,
            sell_price: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["productName"], "Widget");
        assert_eq!(json["thumbnailUrl"], "https://m.media-amazon.com/images/I/x.jpg");
        assert!(json.get("buyPrice").is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let record: ProductRecord =
            serde_json::from_str(r#"{"asin": "B0CTHXMYL8", "buyPrice": 12.5}"#).unwrap();
        assert_eq!(record.asin, "B0CTHXMYL8");
        assert!(record.product_name.is_empty());
        assert_eq!(record.buy_price, Some(12.5));
    }

    #[test]
    fn test_display_name_fallback() {
        let mut record = ProductRecord::new("B0CTHXMYL8", "https://www.amazon.de/dp/B0CTHXMYL8");
        assert_eq!(record.display_name(), "B0CTHXMYL8");

        record.product_name = "Widget".to_string();
        assert_eq!(record.display_name(), "Widget");
    }
}
