//! In-memory [`RuleEngine`].

use super::{apply_update, EngineError, RuleEngine};
use crate::rules::matcher::{evaluate, RuleMatch};
use crate::rules::model::{RedirectRule, RuleUpdate};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Rule engine that keeps rules in process memory.
///
/// Clones share state. Every accepted update is recorded so callers can
/// inspect what was issued.
#[derive(Clone)]
pub struct MemoryRuleEngine {
    state: Arc<Mutex<State>>,
    available: bool,
    atomic: bool,
}

#[derive(Default)]
struct State {
    rules: Vec<RedirectRule>,
    history: Vec<RuleUpdate>,
}

impl MemoryRuleEngine {
    /// Creates an empty engine with atomic replace.
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(State::default())), available: true, atomic: true }
    }

    /// Creates an engine that only applies one half of an update at a time.
    pub fn non_atomic() -> Self {
        Self { atomic: false, ..Self::new() }
    }

    /// Creates an engine reporting that rule interception is unavailable.
    pub fn unavailable() -> Self {
        Self { available: false, ..Self::new() }
    }

    /// Returns the currently installed rules.
    pub fn rules(&self) -> Vec<RedirectRule> {
        self.state.lock().map(|s| s.rules.clone()).unwrap_or_default()
    }

    /// Returns every accepted update, oldest first.
    pub fn history(&self) -> Vec<RuleUpdate> {
        self.state.lock().map(|s| s.history.clone()).unwrap_or_default()
    }

    /// Evaluates a navigation against the installed rules.
    pub fn redirect_for(&self, url: &str) -> Option<RuleMatch> {
        evaluate(&self.rules(), url)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, EngineError> {
        self.state.lock().map_err(|_| EngineError::Rejected("engine lock poisoned".to_string()))
    }
}

impl Default for MemoryRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleEngine for MemoryRuleEngine {
    fn is_available(&self) -> bool {
        self.available
    }

    fn supports_atomic_replace(&self) -> bool {
        self.atomic
    }

    async fn list_rules(&self) -> Result<Vec<RedirectRule>, EngineError> {
        Ok(self.lock()?.rules.clone())
    }

    async fn update_rules(&self, update: RuleUpdate) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        apply_update(&mut state.rules, &update)?;
        debug!(
            "Applied rule update: -{} +{}",
            update.remove_rule_ids.len(),
            update.add_rules.len()
        );
        state.history.push(update);
        Ok(())
    }
}
