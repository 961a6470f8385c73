//! Evaluates redirect rules against request URLs.
//!
//! Used by the in-process rule engines to answer "where would this navigation
//! go?". Among matching rules the highest priority wins, then the lowest id.

use crate::rules::model::{QueryTransform, Redirect, RedirectRule};
use regex_lite::Regex;
use std::collections::HashSet;
use tracing::{trace, warn};
use url::Url;

/// Result of evaluating a URL against a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// Id of the rule that fired
    pub rule_id: u32,
    /// URL the request is redirected to
    pub redirect_url: String,
}

/// Returns the redirect produced by `rules` for `url`, if any.
///
/// A rule whose rewrite leaves the URL unchanged does not count as a redirect.
pub fn evaluate(rules: &[RedirectRule], url: &str) -> Option<RuleMatch> {
    let mut ordered: Vec<&RedirectRule> = rules.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

    for rule in ordered {
        let regex = match Regex::new(&rule.condition.regex_filter) {
            Ok(regex) => regex,
            Err(e) => {
                warn!("Skipping rule {} with invalid regex: {}", rule.id, e);
                continue;
            }
        };

        if !regex.is_match(url) {
            continue;
        }

        trace!("Rule {} matches {}", rule.id, url);
        let target = match &rule.action.redirect {
            Redirect::RegexSubstitution(template) => {
                let replacement = engine_template(template);
                regex.replace(url, replacement.as_str()).into_owned()
            }
            Redirect::Transform(transform) => apply_query_transform(url, &transform.query_transform)?,
        };

        if target == url {
            return None;
        }

        return Some(RuleMatch { rule_id: rule.id, redirect_url: target });
    }

    None
}

/// Converts a `\N` back-reference template into `${N}` form.
fn engine_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek().is_some_and(|n| n.is_ascii_digit()) => {
                let digit = chars.next().unwrap_or('0');
                out.push_str("${");
                out.push(digit);
                out.push('}');
            }
            '$' => out.push_str("$$"),
            _ => out.push(c),
        }
    }

    out
}

/// Removes then adds query parameters. Kept parameters stay byte-for-byte
/// as they were, in their original order.
fn apply_query_transform(url: &str, transform: &QueryTransform) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;

    let removed: HashSet<&str> = transform
        .remove_params
        .iter()
        .chain(transform.add_or_replace_params.iter().map(|p| &p.key))
        .map(String::as_str)
        .collect();

    let mut query: Vec<String> = parsed
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| !removed.contains(decoded_key(segment).as_str()))
        .map(String::from)
        .collect();
    // Values are stored already encoded by the compiler.
    for param in &transform.add_or_replace_params {
        query.push(format!("{}={}", param.key, param.value));
    }

    if query.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.set_query(Some(&query.join("&")));
    }

    Some(parsed.to_string())
}

/// Decoded name of one raw `key[=value]` query segment.
fn decoded_key(segment: &str) -> String {
    url::form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}
