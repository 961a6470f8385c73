//! [`RuleEngine`] that keeps its installed rules in a JSON file.
//!
//! Each update is applied to the full rule list and written back through a
//! temporary sibling plus rename, so a single update is atomic on disk.

use super::{apply_update, EngineError, RuleEngine};
use crate::rules::matcher::{evaluate, RuleMatch};
use crate::rules::model::{RedirectRule, RuleUpdate};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File name used inside the data directory.
pub const RULES_FILE: &str = "rules.json";

/// Rule engine persisted under a data directory.
///
/// The file is re-read on every call, so rules installed by another process
/// sharing the data directory are always visible.
pub struct FileRuleEngine {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileRuleEngine {
    /// Opens the engine in `data_dir`, checking any previously installed rules.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = data_dir.as_ref().join(RULES_FILE);
        let rules = read_rules(&path).await?;

        debug!("Loaded {} installed rules from {}", rules.len(), path.display());
        Ok(Self { path, write_lock: Mutex::new(()) })
    }

    /// Returns the rules file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Evaluates a navigation against the installed rules.
    pub async fn redirect_for(&self, url: &str) -> Option<RuleMatch> {
        match read_rules(&self.path).await {
            Ok(rules) => evaluate(&rules, url),
            Err(e) => {
                warn!("Cannot read installed rules: {}", e);
                None
            }
        }
    }

    async fn persist(&self, rules: &[RedirectRule]) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(rules)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn read_rules(path: &Path) -> Result<Vec<RedirectRule>, EngineError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl RuleEngine for FileRuleEngine {
    fn supports_atomic_replace(&self) -> bool {
        true
    }

    async fn list_rules(&self) -> Result<Vec<RedirectRule>, EngineError> {
        read_rules(&self.path).await
    }

    async fn update_rules(&self, update: RuleUpdate) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().await;
        let mut rules = read_rules(&self.path).await?;
        apply_update(&mut rules, &update)?;
        self.persist(&rules).await?;

        info!("Installed {} redirect rules", rules.len());
        Ok(())
    }
}
