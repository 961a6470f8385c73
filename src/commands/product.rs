//! Product capture command implementation.

use super::Services;
use crate::amazon::marketplaces::find_by_url;
use crate::amazon::navigation::{capture_product, PageSource};
use crate::amazon::parser::asin_from_url;
use crate::amazon::AmazonClient;
use crate::format::Formatter;
use crate::store;
use anyhow::{Context, Result};
use tracing::info;

/// Fetches a product page, extracts the product and caches it for reporting.
pub struct ProductCommand<'a> {
    services: &'a Services,
}

impl<'a> ProductCommand<'a> {
    pub fn new(services: &'a Services) -> Self {
        Self { services }
    }

    /// Captures the product at `url` over HTTP.
    pub async fn execute(&self, url: &str) -> Result<String> {
        if asin_from_url(url).is_none() {
            anyhow::bail!("Not a product page URL: '{}'. Expected /dp/<ASIN> or /gp/product/<ASIN>.", url);
        }

        let marketplaces = self.services.synchronizer.marketplaces().await?;
        let accept_language = find_by_url(marketplaces, url).map(|m| m.accept_language());

        let client =
            AmazonClient::new(&self.services.config).context("Failed to create HTTP client")?;
        let page = client.page(url, accept_language);

        self.execute_with_page(&page).await
    }

    /// Captures the product shown by `page` (for testing).
    pub async fn execute_with_page(&self, page: &dyn PageSource) -> Result<String> {
        let product = capture_product(page, self.services.config.poll_policy())
            .await?
            .context("Page is not a product page")?;

        info!("Captured product: {}", product.asin);
        store::save_product(self.services.store.as_ref(), &product).await?;

        Ok(Formatter::new(self.services.config.format).format_product(&product))
    }

    /// Shows the cached product.
    pub async fn show(&self) -> Result<String> {
        let product = store::load_product(self.services.store.as_ref())
            .await?
            .context("No product data available")?;
        Ok(Formatter::new(self.services.config.format).format_product(&product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::services;
    use crate::config::Config;
    use async_trait::async_trait;

    const PAGE: &str = r#"
        <html><body>
            <input type="hidden" id="ASIN" name="ASIN" value="B0CTHXMYL8">
            <span id="productTitle"> Mock Widget </span>
            <img id="landingImage" src="https://m.media-amazon.com/images/I/widget.jpg">
            <div id="feature-bullets"><ul><li><span>Sturdy and small</span></li></ul></div>
        </body></html>
    "#;

    struct StaticPage {
        url: String,
        html: String,
    }

    #[async_trait]
    impl PageSource for StaticPage {
        async fn current_url(&self) -> Result<String> {
            Ok(self.url.clone())
        }

        async fn snapshot(&self) -> Result<String> {
            Ok(self.html.clone())
        }
    }

    #[tokio::test]
    async fn test_capture_caches_product() {
        let (services, _dir) = services(Config::default()).await;
        let cmd = ProductCommand::new(&services);
        let page = StaticPage {
            url: "https://www.amazon.de/Mock-Widget/dp/B0CTHXMYL8".to_string(),
            html: PAGE.to_string(),
        };

        let out = cmd.execute_with_page(&page).await.unwrap();
        assert!(out.contains("Title:   Mock Widget"));

        let cached = store::load_product(services.store.as_ref()).await.unwrap().unwrap();
        assert_eq!(cached.asin, "B0CTHXMYL8");
        assert_eq!(cached.description, "Sturdy and small");
        assert!(cmd.show().await.unwrap().contains("B0CTHXMYL8"));
    }

    #[tokio::test]
    async fn test_non_product_page() {
        let (services, _dir) = services(Config::default()).await;
        let cmd = ProductCommand::new(&services);
        let page = StaticPage { url: "https://www.amazon.de/s?k=lego".to_string(), html: PAGE.to_string() };

        let err = cmd.execute_with_page(&page).await.unwrap_err();
        assert!(err.to_string().contains("not a product page"));
        assert!(cmd.execute("https://www.amazon.de/s?k=lego").await.is_err());
    }

    #[tokio::test]
    async fn test_show_without_cache() {
        let (services, _dir) = services(Config::default()).await;
        let err = ProductCommand::new(&services).show().await.unwrap_err();
        assert_eq!(err.to_string(), "No product data available");
    }
}
