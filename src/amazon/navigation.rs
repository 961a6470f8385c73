//! Waiting for a product page to settle after navigation.
//!
//! Amazon swaps products client-side: the URL changes before the DOM does.
//! [`wait_for_product`] polls a [`PageSource`] until the page reports the
//! expected ASIN, then hands back that snapshot for parsing.

use crate::amazon::models::ProductRecord;
use crate::amazon::parser::{asin_from_url, Parser};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// A page whose current URL and HTML can be sampled repeatedly.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Returns the URL the page is currently showing.
    async fn current_url(&self) -> Result<String>;

    /// Returns the current HTML of the page.
    async fn snapshot(&self) -> Result<String>;
}

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Number of re-checks after the first one
    pub attempts: u32,
    /// Pause between checks
    pub interval: Duration,
}

impl PollPolicy {
    /// Creates a policy from an attempt count and an interval in milliseconds.
    pub fn new(attempts: u32, interval_ms: u64) -> Self {
        Self { attempts, interval: Duration::from_millis(interval_ms) }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(30, 100)
    }
}

/// Polls until the page shows a title and the expected ASIN.
///
/// When `expected_asin` is `None` a title alone is enough. Gives up after
/// `policy.attempts` re-checks and returns the last snapshot anyway.
pub async fn wait_for_product(
    page: &dyn PageSource,
    expected_asin: Option<&str>,
    policy: PollPolicy,
) -> Result<String> {
    let parser = Parser::new();
    debug!("Waiting for new product, expected ASIN: {:?}", expected_asin);

    let mut attempt = 0;
    loop {
        let html = page.snapshot().await?;
        let page_asin = parser.page_asin(&html);
        let has_title = parser.has_title(&html);
        debug!("poll #{}: pageAsin={:?}, hasTitle={}", attempt, page_asin, has_title);

        let asin_matches = match expected_asin {
            Some(expected) => page_asin.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(expected)),
            None => true,
        };

        if has_title && asin_matches {
            return Ok(html);
        }

        attempt += 1;
        if attempt > policy.attempts {
            warn!("Gave up waiting for product after {} polls", attempt);
            return Ok(html);
        }

        tokio::time::sleep(policy.interval).await;
    }
}

/// Captures the product currently shown by `page`.
///
/// Returns `Ok(None)` when the page URL is not a product page.
pub async fn capture_product(
    page: &dyn PageSource,
    policy: PollPolicy,
) -> Result<Option<ProductRecord>> {
    let url = page.current_url().await?;
    let Some(asin) = asin_from_url(&url) else {
        debug!("No ASIN found in URL: {}", url);
        return Ok(None);
    };

    let html = wait_for_product(page, Some(&asin), policy).await?;
    Parser::new().parse_product_page(&html, &url).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Page that walks through a fixed list of snapshots, repeating the last one.
    struct ScriptedPage {
        url: String,
        snapshots: Vec<String>,
        polls: AtomicUsize,
        fail: Mutex<bool>,
    }

    impl ScriptedPage {
        fn new(url: &str, snapshots: Vec<String>) -> Self {
            Self {
                url: url.to_string(),
                snapshots,
                polls: AtomicUsize::new(0),
                fail: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl PageSource for ScriptedPage {
        async fn current_url(&self) -> Result<String> {
            Ok(self.url.clone())
        }

        async fn snapshot(&self) -> Result<String> {
            if *self.fail.lock().unwrap() {
                anyhow::bail!("Simulated page error");
            }
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(self.snapshots[n.min(self.snapshots.len() - 1)].clone())
        }
    }

    fn page_html(asin: &str, title: &str) -> String {
        format!(
            r#"<input id="ASIN" value="{}"><span id="productTitle">{}</span>"#,
            asin, title
        )
    }

    fn fast_policy(attempts: u32) -> PollPolicy {
        PollPolicy::new(attempts, 1)
    }

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.attempts, 30);
        assert_eq!(policy.interval, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_waits_for_expected_asin() {
        let page = ScriptedPage::new(
            "https://www.amazon.de/dp/B0CTHXMYL8",
            vec![
                page_html("B000000001", "Old Product"),
                page_html("B000000001", "Old Product"),
                page_html("B0CTHXMYL8", "New Product"),
            ],
        );

        let html = wait_for_product(&page, Some("B0CTHXMYL8"), fast_policy(30)).await.unwrap();
        assert!(html.contains("New Product"));
        assert_eq!(page.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let page = ScriptedPage::new(
            "https://www.amazon.de/dp/B0CTHXMYL8",
            vec![page_html("B000000001", "Old Product")],
        );

        let html = wait_for_product(&page, Some("B0CTHXMYL8"), fast_policy(3)).await.unwrap();
        assert!(html.contains("Old Product"));
        assert_eq!(page.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_title_only_without_expected_asin() {
        let page = ScriptedPage::new(
            "https://www.amazon.de/dp/B0CTHXMYL8",
            vec!["<html></html>".to_string(), page_html("", "Loaded")],
        );

        let html = wait_for_product(&page, None, fast_policy(5)).await.unwrap();
        assert!(html.contains("Loaded"));
    }

    #[tokio::test]
    async fn test_snapshot_error_propagates() {
        let page = ScriptedPage::new("https://www.amazon.de/dp/B0CTHXMYL8", vec![]);
        *page.fail.lock().unwrap() = true;

        assert!(wait_for_product(&page, None, fast_policy(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_capture_product() {
        let page = ScriptedPage::new(
            "https://www.amazon.fr/Widget/dp/B0CTHXMYL8/ref=sr_1_1",
            vec![page_html("B0CTHXMYL8", "Widget")],
        );

        let record = capture_product(&page, fast_policy(1)).await.unwrap().unwrap();
        assert_eq!(record.asin, "B0CTHXMYL8");
        assert_eq!(record.product_name, "Widget");
    }

    #[tokio::test]
    async fn test_capture_non_product_page() {
        let page = ScriptedPage::new("https://www.amazon.fr/gp/cart/view.html", vec![]);
        assert!(capture_product(&page, fast_policy(1)).await.unwrap().is_none());
    }
}
