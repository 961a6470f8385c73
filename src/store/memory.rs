//! In-memory [`ConfigStore`].

use super::{ConfigStore, StorageArea, StorageChange, StoreError, CHANGE_CHANNEL_CAPACITY};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::trace;

type Entries = HashMap<(StorageArea, String), Value>;

/// Process-local store; used for the session area and in tests.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<Entries>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { entries: Arc::new(Mutex::new(HashMap::new())), changes }
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, Entries>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, area: StorageArea, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries()?.get(&(area, key.to_string())).cloned())
    }

    async fn set(&self, area: StorageArea, key: &str, value: Value) -> Result<(), StoreError> {
        let old_value = self.entries()?.insert((area, key.to_string()), value.clone());
        trace!("{}.{} updated", area, key);

        // No subscribers is fine.
        let _ = self.changes.send(StorageChange::single(area, key, old_value, Some(value)));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
