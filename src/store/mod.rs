//! Key-value settings store with change notifications.
//!
//! Values are JSON documents grouped in [`StorageArea`]s. Every successful
//! `set` is broadcast to subscribers as a [`StorageChange`].

pub mod file;
pub mod memory;
pub mod tags;

use crate::amazon::models::ProductRecord;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::broadcast;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use tags::TagMapping;

/// Key of the marketplace-tag mapping (sync area).
pub const TAGS_KEY: &str = "countryTags";

/// Key of the Discord webhook URL (sync area).
pub const WEBHOOK_KEY: &str = "discordWebhookUrl";

/// Key of the last captured product (session area).
pub const PRODUCT_KEY: &str = "product";

/// Capacity of the change broadcast channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Storage scope of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    /// User settings, synchronized across browsers
    Sync,
    /// Machine-local data
    Local,
    /// Data that lives for one browsing session
    Session,
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageArea::Sync => write!(f, "sync"),
            StorageArea::Local => write!(f, "local"),
            StorageArea::Session => write!(f, "session"),
        }
    }
}

/// Old and new value of one changed key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// A change notification: which area, and which keys changed.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub area: StorageArea,
    pub changes: BTreeMap<String, ValueChange>,
}

impl StorageChange {
    /// Creates a change for a single key.
    pub fn single(area: StorageArea, key: &str, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        let mut changes = BTreeMap::new();
        changes.insert(key.to_string(), ValueChange { old_value, new_value });
        Self { area, changes }
    }

    /// True if `key` changed in `area`.
    pub fn touches(&self, area: StorageArea, key: &str) -> bool {
        self.area == area && self.changes.contains_key(key)
    }
}

/// Errors raised by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored value for '{key}' is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous key-value store with push change notifications.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Reads a value; `Ok(None)` if the key is absent.
    async fn get(&self, area: StorageArea, key: &str) -> Result<Option<Value>, StoreError>;

    /// Writes a value and notifies subscribers.
    async fn set(&self, area: StorageArea, key: &str, value: Value) -> Result<(), StoreError>;

    /// Subscribes to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

async fn get_typed<T: DeserializeOwned>(
    store: &dyn ConfigStore,
    area: StorageArea,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(area, key).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Malformed { key: key.to_string(), source }),
    }
}

fn to_value<T: Serialize>(key: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Malformed { key: key.to_string(), source })
}

/// Reads the tag mapping; an absent key is an empty mapping.
pub async fn load_tags(store: &dyn ConfigStore) -> Result<TagMapping, StoreError> {
    Ok(get_typed(store, StorageArea::Sync, TAGS_KEY).await?.unwrap_or_default())
}

/// Persists the tag mapping, dropping blank tags.
pub async fn save_tags(store: &dyn ConfigStore, tags: &TagMapping) -> Result<(), StoreError> {
    let value = to_value(TAGS_KEY, &tags.normalized())?;
    store.set(StorageArea::Sync, TAGS_KEY, value).await
}

/// Reads the Discord webhook URL.
pub async fn load_webhook(store: &dyn ConfigStore) -> Result<Option<String>, StoreError> {
    let url: Option<String> = get_typed(store, StorageArea::Sync, WEBHOOK_KEY).await?;
    Ok(url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()))
}

/// Persists the Discord webhook URL.
pub async fn save_webhook(store: &dyn ConfigStore, url: &str) -> Result<(), StoreError> {
    store.set(StorageArea::Sync, WEBHOOK_KEY, Value::String(url.trim().to_string())).await
}

/// Reads the last captured product.
pub async fn load_product(store: &dyn ConfigStore) -> Result<Option<ProductRecord>, StoreError> {
    get_typed(store, StorageArea::Session, PRODUCT_KEY).await
}

/// Replaces the last captured product.
pub async fn save_product(store: &dyn ConfigStore, product: &ProductRecord) -> Result<(), StoreError> {
    let value = to_value(PRODUCT_KEY, product)?;
    store.set(StorageArea::Session, PRODUCT_KEY, value).await
}
