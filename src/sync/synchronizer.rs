//! Recomputes redirect rules and replaces the engine's rule set.

use super::SyncError;
use crate::amazon::marketplaces::{CatalogError, Marketplace, MarketplaceSource};
use crate::engine::RuleEngine;
use crate::rules::compiler::{compile, RuleStrategy};
use crate::rules::model::{RedirectRule, RuleUpdate};
use crate::store::{load_tags, ConfigStore};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};

/// Outcome of one synchronization request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Rule ids removed from the engine
    pub removed: usize,
    /// Rules added to the engine
    pub added: usize,
    /// True if a later run already covered this request
    pub coalesced: bool,
}

impl SyncReport {
    fn coalesced() -> Self {
        Self { coalesced: true, ..Self::default() }
    }
}

/// Single-flight rule synchronizer.
///
/// Requests are numbered as they arrive. Runs are serialized behind an async
/// mutex that remembers the highest request number the last successful run
/// covered: a run covers every request made before it read the tags. A
/// request that finds itself covered returns without touching the engine.
pub struct RuleSynchronizer {
    source: Arc<dyn MarketplaceSource>,
    store: Arc<dyn ConfigStore>,
    engine: Arc<dyn RuleEngine>,
    strategy: RuleStrategy,
    marketplaces: OnceCell<Vec<Marketplace>>,
    requested: AtomicU64,
    applied: Mutex<u64>,
}

impl RuleSynchronizer {
    /// Creates a synchronizer; nothing is loaded until the first request.
    pub fn new(
        source: Arc<dyn MarketplaceSource>,
        store: Arc<dyn ConfigStore>,
        engine: Arc<dyn RuleEngine>,
        strategy: RuleStrategy,
    ) -> Self {
        Self {
            source,
            store,
            engine,
            strategy,
            marketplaces: OnceCell::new(),
            requested: AtomicU64::new(0),
            applied: Mutex::new(0),
        }
    }

    /// Returns the rule strategy in use.
    pub fn strategy(&self) -> RuleStrategy {
        self.strategy
    }

    /// Returns the marketplace list, loading it on first use.
    ///
    /// Concurrent callers share one in-flight load. A failed load is not
    /// cached, so the next call tries again.
    pub async fn marketplaces(&self) -> Result<&[Marketplace], SyncError> {
        let marketplaces = self
            .marketplaces
            .get_or_try_init(|| async {
                let loaded = self.source.load().await?;
                info!("Loaded {} marketplaces", loaded.len());
                Ok::<_, CatalogError>(loaded)
            })
            .await
            .map_err(SyncError::ConfigLoad)?;
        Ok(marketplaces.as_slice())
    }

    /// Compiles the rules for the current configuration without installing them.
    pub async fn desired_rules(&self) -> Result<Vec<RedirectRule>, SyncError> {
        let marketplaces = self.marketplaces().await?;
        let tags = load_tags(self.store.as_ref()).await.map_err(SyncError::StoreRead)?;
        Ok(compile(marketplaces, &tags, self.strategy))
    }

    /// Synchronizes and logs any failure.
    pub async fn synchronize(&self) {
        match self.try_synchronize().await {
            Ok(report) if report.coalesced => {}
            Ok(report) => debug!("Rules synchronized: -{} +{}", report.removed, report.added),
            Err(SyncError::HostCapabilityUnavailable) => {
                warn!("Skipping rule synchronization: {}", SyncError::HostCapabilityUnavailable)
            }
            Err(e) if e.may_be_partial() => {
                error!("Rule synchronization failed, installed rules may be incomplete: {}", e)
            }
            Err(e) => error!("Rule synchronization aborted, previous rules kept: {}", e),
        }
    }

    /// Synchronizes and returns what changed.
    pub async fn try_synchronize(&self) -> Result<SyncReport, SyncError> {
        let ticket = self.requested.fetch_add(1, Ordering::SeqCst) + 1;

        let mut applied = self.applied.lock().await;
        if *applied >= ticket {
            debug!("Sync request {} already covered by run {}", ticket, *applied);
            return Ok(SyncReport::coalesced());
        }

        let covers = self.requested.load(Ordering::SeqCst);
        let report = self.run().await?;
        *applied = covers;
        Ok(report)
    }

    async fn run(&self) -> Result<SyncReport, SyncError> {
        if !self.engine.is_available() {
            return Err(SyncError::HostCapabilityUnavailable);
        }

        let desired = self.desired_rules().await?;
        let installed = self.engine.list_rules().await.map_err(SyncError::RuleEngineUpdate)?;
        let remove: Vec<u32> = installed.iter().map(|r| r.id).collect();

        let report = SyncReport { removed: remove.len(), added: desired.len(), coalesced: false };

        if self.engine.supports_atomic_replace() {
            let update = RuleUpdate::replace(remove, desired);
            if !update.is_empty() {
                self.engine.update_rules(update).await.map_err(SyncError::RuleEngineUpdate)?;
            }
        } else {
            // Remove first: a failure in between leaves no rules rather than stale ones.
            if !remove.is_empty() {
                self.engine
                    .update_rules(RuleUpdate::remove(remove))
                    .await
                    .map_err(SyncError::RuleEngineUpdate)?;
            }
            if !desired.is_empty() {
                self.engine
                    .update_rules(RuleUpdate::add(desired))
                    .await
                    .map_err(SyncError::RuleEngineUpdate)?;
            }
        }

        info!("Installed {} affiliate rules (removed {})", report.added, report.removed);
        Ok(report)
    }
}
