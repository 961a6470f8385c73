//! Compiles marketplaces and affiliate tags into redirect rules.
//!
//! [`compile`] is a pure projection: the same inputs always yield the same
//! rules, with ids assigned densely from 1 in marketplace order.

use crate::amazon::marketplaces::Marketplace;
use crate::rules::model::{
    QueryParam, QueryTransform, Redirect, RedirectRule, ResourceType, RuleAction, RuleCondition,
    UrlTransform,
};
use crate::store::TagMapping;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Priority given to every compiled rule.
pub const RULE_PRIORITY: u32 = 1;

/// Query parameter carrying the affiliate tag.
pub const TAG_PARAM: &str = "tag";

/// How compiled rules rewrite matching requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStrategy {
    /// Only product pages match; they are rewritten to the canonical tagged URL.
    #[default]
    ProductRewrite,
    /// Every page on the domain matches; any `tag` parameter is replaced.
    QueryTransform,
}

impl FromStr for RuleStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "product_rewrite" | "rewrite" => Ok(RuleStrategy::ProductRewrite),
            "query_transform" | "transform" => Ok(RuleStrategy::QueryTransform),
            _ => Err(format!(
                "Unknown rule strategy: {}. Use: product_rewrite, query_transform",
                s
            )),
        }
    }
}

impl fmt::Display for RuleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStrategy::ProductRewrite => write!(f, "product_rewrite"),
            RuleStrategy::QueryTransform => write!(f, "query_transform"),
        }
    }
}

/// Compiles one rule per marketplace with a configured tag.
pub fn compile(
    marketplaces: &[Marketplace],
    tags: &TagMapping,
    strategy: RuleStrategy,
) -> Vec<RedirectRule> {
    let mut rules = Vec::new();

    for marketplace in marketplaces {
        let Some(tag) = tags.tag_for(&marketplace.id) else {
            continue;
        };

        let id = rules.len() as u32 + 1;
        let rule = match strategy {
            RuleStrategy::ProductRewrite => product_rewrite_rule(id, marketplace, tag),
            RuleStrategy::QueryTransform => query_transform_rule(id, marketplace, tag),
        };

        debug!("Created rule {} for {} with tag: {}", id, marketplace.domain, tag);
        rules.push(rule);
    }

    rules
}

/// Regex matching product pages on `domain` (any subdomain).
///
/// Groups: 1 scheme, 2 subdomain, 3 leading path, 4 `dp`/`gp/product`, 5 ASIN.
pub fn product_url_pattern(domain: &str) -> String {
    format!(
        r"^(https?)://([^/]+\.)?{}/(.*/)?(dp|gp/product)/([A-Z0-9]{{10}}).*$",
        regex_lite::escape(domain)
    )
}

/// Regex matching any page on `domain` (any subdomain).
pub fn domain_url_pattern(domain: &str) -> String {
    format!(r"^https?://([^/]+\.)?{}/", regex_lite::escape(domain))
}

fn frame_types() -> Vec<ResourceType> {
    vec![ResourceType::MainFrame, ResourceType::SubFrame]
}

fn product_rewrite_rule(id: u32, marketplace: &Marketplace, tag: &str) -> RedirectRule {
    let substitution = format!(
        r"https://www.{}/dp/\5/ref=nosim?{}={}",
        marketplace.domain,
        TAG_PARAM,
        urlencoding::encode(tag)
    );

    RedirectRule {
        id,
        priority: RULE_PRIORITY,
        action: RuleAction::redirect(Redirect::RegexSubstitution(substitution)),
        condition: RuleCondition {
            regex_filter: product_url_pattern(&marketplace.domain),
            resource_types: frame_types(),
        },
    }
}

fn query_transform_rule(id: u32, marketplace: &Marketplace, tag: &str) -> RedirectRule {
    let transform = UrlTransform {
        query_transform: QueryTransform {
            remove_params: vec![TAG_PARAM.to_string()],
            add_or_replace_params: vec![QueryParam {
                key: TAG_PARAM.to_string(),
                value: urlencoding::encode(tag).into_owned(),
            }],
        },
    };

    RedirectRule {
        id,
        priority: RULE_PRIORITY,
        action: RuleAction::redirect(Redirect::Transform(transform)),
        condition: RuleCondition {
            regex_filter: domain_url_pattern(&marketplace.domain),
            resource_types: frame_types(),
        },
    }
}
