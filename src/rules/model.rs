//! Redirect rule data model.
//!
//! The shape mirrors what a browser's declarative request-interception engine
//! accepts: an id, a priority, a condition (URL regex + resource types) and a
//! redirect action that is either a regex substitution or a query transform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request types a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
}

/// Match condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// Regex evaluated against the full request URL
    pub regex_filter: String,
    /// Request types the rule applies to
    pub resource_types: Vec<ResourceType>,
}

/// A query parameter to add or replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub key: String,
    pub value: String,
}

/// Structured query string rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTransform {
    /// Parameter names removed first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_params: Vec<String>,
    /// Parameters appended (or replaced) afterwards
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_or_replace_params: Vec<QueryParam>,
}

/// URL transform applied by a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlTransform {
    pub query_transform: QueryTransform,
}

/// Where a redirect sends the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Redirect {
    /// Full URL template; `\N` refers to capture group N of the condition regex
    RegexSubstitution(String),
    /// Rewrite of the request URL's query string
    Transform(UrlTransform),
}

/// Kind of action; only redirects are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Redirect,
}

/// Action taken when a rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub redirect: Redirect,
}

impl RuleAction {
    /// Creates a redirect action.
    pub fn redirect(redirect: Redirect) -> Self {
        Self { kind: ActionType::Redirect, redirect }
    }
}

/// A single redirect rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    /// 1-based id, unique within a rule set
    pub id: u32,
    /// Higher priority wins when several rules match
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl RedirectRule {
    /// Returns the URL pattern this rule matches.
    pub fn domain_pattern(&self) -> &str {
        &self.condition.regex_filter
    }

    /// Returns the (percent-encoded) affiliate tag this rule applies.
    pub fn tag_value(&self) -> Option<&str> {
        match &self.action.redirect {
            Redirect::RegexSubstitution(template) => {
                template.rsplit_once("tag=").map(|(_, tag)| tag)
            }
            Redirect::Transform(transform) => transform
                .query_transform
                .add_or_replace_params
                .iter()
                .find(|p| p.key == "tag")
                .map(|p| p.value.as_str()),
        }
    }
}

impl fmt::Display for RedirectRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [p{}] {} -> tag={}",
            self.id,
            self.priority,
            self.domain_pattern(),
            self.tag_value().unwrap_or("-")
        )
    }
}

/// A batch change submitted to a rule engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    /// Ids removed before anything is added
    #[serde(default)]
    pub remove_rule_ids: Vec<u32>,
    /// Rules added after removal
    #[serde(default)]
    pub add_rules: Vec<RedirectRule>,
}

impl RuleUpdate {
    /// Creates an update that only removes rules.
    pub fn remove(ids: Vec<u32>) -> Self {
        Self { remove_rule_ids: ids, add_rules: Vec::new() }
    }

    /// Creates an update that only adds rules.
    pub fn add(rules: Vec<RedirectRule>) -> Self {
        Self { remove_rule_ids: Vec::new(), add_rules: rules }
    }

    /// Creates an update that replaces `ids` with `rules`.
    pub fn replace(ids: Vec<u32>, rules: Vec<RedirectRule>) -> Self {
        Self { remove_rule_ids: ids, add_rules: rules }
    }

    /// True if the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.remove_rule_ids.is_empty() && self.add_rules.is_empty()
    }
}
