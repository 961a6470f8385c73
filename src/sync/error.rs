use crate::amazon::marketplaces::CatalogError;
use crate::engine::EngineError;
use crate::store::StoreError;

/// Reasons a synchronization did not install the desired rules.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to load marketplaces: {0}")]
    ConfigLoad(#[source] CatalogError),

    #[error("Rule interception is not available on this host")]
    HostCapabilityUnavailable,

    #[error("Failed to read affiliate tags: {0}")]
    StoreRead(#[source] StoreError),

    #[error("Rule engine update failed: {0}")]
    RuleEngineUpdate(#[source] EngineError),
}

impl SyncError {
    /// True if the installed rules may no longer match any configuration.
    ///
    /// Only an engine failure between removal and addition can leave a
    /// partial state; every other kind aborts before touching the engine.
    pub fn may_be_partial(&self) -> bool {
        matches!(self, SyncError::RuleEngineUpdate(_))
    }
}
