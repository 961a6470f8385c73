//! CLI command implementations.

pub mod product;
pub mod report;
pub mod rules;
pub mod run;
pub mod tags;

use crate::amazon::marketplaces::{BundledCatalog, FileCatalog, MarketplaceSource};
use crate::config::Config;
use crate::engine::FileRuleEngine;
use crate::store::JsonFileStore;
use crate::sync::RuleSynchronizer;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

pub use product::ProductCommand;
pub use report::ReportCommand;
pub use rules::RulesCommand;
pub use run::RunCommand;
pub use tags::TagsCommand;

/// Store, engine and synchronizer opened from the data directory.
pub struct Services {
    pub config: Config,
    pub store: Arc<JsonFileStore>,
    pub engine: Arc<FileRuleEngine>,
    pub synchronizer: Arc<RuleSynchronizer>,
}

impl Services {
    /// Opens the settings store and rule engine under `config.data_dir()`.
    pub async fn open(config: Config) -> Result<Self> {
        let data_dir = config.data_dir();
        debug!("Using data directory: {}", data_dir.display());

        let store = Arc::new(
            JsonFileStore::open(config.settings_path())
                .await
                .context("Failed to open settings store")?,
        );
        let engine = Arc::new(
            FileRuleEngine::open(&data_dir).await.context("Failed to open rule engine")?,
        );

        let source: Arc<dyn MarketplaceSource> = match &config.marketplaces {
            Some(path) => Arc::new(FileCatalog::new(path)),
            None => Arc::new(BundledCatalog),
        };

        let synchronizer = Arc::new(RuleSynchronizer::new(
            source,
            store.clone(),
            engine.clone(),
            config.rule_strategy,
        ));

        Ok(Self { config, store, engine, synchronizer })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// Services rooted in a fresh temporary data directory.
    pub async fn services(config: Config) -> (Services, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = Config { data_dir: Some(dir.path().to_path_buf()), ..config };
        (Services::open(config).await.unwrap(), dir)
    }
}
