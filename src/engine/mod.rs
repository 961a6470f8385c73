//! Host request-interception engines.
//!
//! A [`RuleEngine`] holds the active redirect rules and applies batched
//! updates. The browser's engine is the real host; the implementations here
//! keep rules in memory or on disk and evaluate them with [`crate::rules::matcher`].

pub mod file;
pub mod memory;

use crate::rules::model::{RedirectRule, RuleUpdate};
use async_trait::async_trait;
use std::collections::HashSet;

pub use file::FileRuleEngine;
pub use memory::MemoryRuleEngine;

/// Errors reported by a rule engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Rule id {0} is already installed")]
    DuplicateId(u32),

    #[error("Rule {id} is invalid: {reason}")]
    InvalidRule { id: u32, reason: String },

    #[error("Rule engine rejected the update: {0}")]
    Rejected(String),

    #[error("Rule engine storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Rule engine state is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The host's declarative rule engine.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// False when the host does not offer rule interception at all.
    fn is_available(&self) -> bool {
        true
    }

    /// True if one `update_rules` call removes and adds atomically.
    fn supports_atomic_replace(&self) -> bool {
        false
    }

    /// Returns the installed rules.
    async fn list_rules(&self) -> Result<Vec<RedirectRule>, EngineError>;

    /// Removes `remove_rule_ids`, then adds `add_rules`.
    async fn update_rules(&self, update: RuleUpdate) -> Result<(), EngineError>;
}

/// Applies `update` to `rules` the way a host engine does.
///
/// Unknown removal ids are ignored; adding an id that is still present, or
/// the same id twice, is an error and leaves `rules` untouched.
pub(crate) fn apply_update(
    rules: &mut Vec<RedirectRule>,
    update: &RuleUpdate,
) -> Result<(), EngineError> {
    let remove: HashSet<u32> = update.remove_rule_ids.iter().copied().collect();
    let mut next: Vec<RedirectRule> =
        rules.iter().filter(|r| !remove.contains(&r.id)).cloned().collect();

    let mut ids: HashSet<u32> = next.iter().map(|r| r.id).collect();
    for rule in &update.add_rules {
        if rule.id == 0 {
            return Err(EngineError::InvalidRule {
                id: rule.id,
                reason: "rule ids start at 1".to_string(),
            });
        }
        if let Err(e) = regex_lite::Regex::new(&rule.condition.regex_filter) {
            return Err(EngineError::InvalidRule { id: rule.id, reason: e.to_string() });
        }
        if !ids.insert(rule.id) {
            return Err(EngineError::DuplicateId(rule.id));
        }
        next.push(rule.clone());
    }

    next.sort_by_key(|r| r.id);
    *rules = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amazon::marketplaces::Marketplace;
    use crate::rules::compiler::{compile, RuleStrategy};
    use crate::store::TagMapping;

    fn compiled(tag: &str) -> Vec<RedirectRule> {
        let marketplaces = vec![
            Marketplace::new("de", "amazon.de", "Germany"),
            Marketplace::new("fr", "amazon.fr", "France"),
        ];
        let tags: TagMapping =
            [("de".to_string(), tag.to_string()), ("fr".to_string(), tag.to_string())]
                .into_iter()
                .collect();
        compile(&marketplaces, &tags, RuleStrategy::ProductRewrite)
    }

    #[test]
    fn test_apply_update_replace() {
        let mut rules = compiled("old");
        let update = RuleUpdate::replace(vec![1, 2], compiled("new"));
        apply_update(&mut rules, &update).unwrap();

        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.tag_value() == Some("new")));
    }

    #[test]
    fn test_apply_update_duplicate_id_leaves_rules() {
        let mut rules = compiled("old");
        let err = apply_update(&mut rules, &RuleUpdate::add(compiled("new"))).unwrap_err();

        assert!(matches!(err, EngineError::DuplicateId(1)));
        assert!(rules.iter().all(|r| r.tag_value() == Some("old")));
    }

    #[test]
    fn test_apply_update_ignores_unknown_removals() {
        let mut rules = compiled("old");
        apply_update(&mut rules, &RuleUpdate::remove(vec![7, 1])).unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_apply_update_rejects_bad_regex() {
        let mut rules = Vec::new();
        let mut bad = compiled("x").remove(0);
        bad.condition.regex_filter = "(unclosed".to_string();

        let err = apply_update(&mut rules, &RuleUpdate::add(vec![bad])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRule { id: 1, .. }));
        assert!(rules.is_empty());
    }
}
