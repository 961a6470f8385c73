//! Runs the synchronizer when the tag mapping changes.

use super::RuleSynchronizer;
use crate::store::{ConfigStore, StorageArea, StorageChange, TAGS_KEY};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Store subscriber that keeps rules in step with `countryTags`.
pub struct ChangeWatcher;

impl ChangeWatcher {
    /// True for changes that affect the compiled rules.
    pub fn is_relevant(change: &StorageChange) -> bool {
        change.touches(StorageArea::Sync, TAGS_KEY)
    }

    /// Subscribes to `store` now and handles changes on a background task.
    pub fn spawn(store: &dyn ConfigStore, synchronizer: Arc<RuleSynchronizer>) -> JoinHandle<()> {
        let receiver = store.subscribe();
        tokio::spawn(Self::watch(receiver, synchronizer))
    }

    /// Handles changes until the store's channel closes.
    pub async fn watch(
        mut receiver: broadcast::Receiver<StorageChange>,
        synchronizer: Arc<RuleSynchronizer>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(change) if Self::is_relevant(&change) => {
                    debug!("Affiliate tags changed, synchronizing rules");
                    synchronizer.synchronize().await;
                }
                Ok(change) => trace!("Ignoring {} change", change.area),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Missed {} storage changes, resynchronizing", missed);
                    synchronizer.synchronize().await;
                }
                Err(RecvError::Closed) => {
                    debug!("Storage change stream closed");
                    break;
                }
            }
        }
    }
}
