//! CSS selectors for Amazon product page parsing.
//!
//! Update this file when Amazon changes their HTML structure.
//!
//! **Update process**: When parsing fails, capture HTML sample,
//! update selectors, and add test fixture.

use scraper::Selector;
use std::sync::LazyLock;

/// Selectors for individual product pages.
pub mod product {
    use super::*;

    /// Product title on detail page.
    pub static TITLE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("#productTitle").unwrap());

    /// Main product image.
    pub static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#landingImage").unwrap());

    /// Image wrapper used when the landing image is missing.
    pub static IMAGE_FALLBACK: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("#imgTagWrapperId img").unwrap());

    /// Feature bullet text spans.
    pub static FEATURE_BULLET: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("#feature-bullets li span").unwrap());

    /// Rows of the product overview expander table.
    pub static OVERVIEW_ROW: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("#poExpander tr").unwrap());

    /// Value cell of an overview row.
    pub static OVERVIEW_VALUE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("td:last-child span").unwrap());

    /// Hidden ASIN input, updated by Amazon after client-side navigation.
    pub static ASIN_INPUT: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("input#ASIN").unwrap());
}

/// Selectors for detecting error/captcha pages.
pub mod errors {
    use super::*;

    /// CAPTCHA form.
    pub static CAPTCHA: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "form[action*='validateCaptcha'], \
             img[src*='captcha']",
        )
        .unwrap()
    });

    /// Dog page (Amazon's error page).
    pub static DOG_PAGE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "img[alt*='dog'], \
             .a-box-inner a[href='/ref=cs_503_link']",
        )
        .unwrap()
    });
}
