//! [`ConfigStore`] persisted as a single JSON document on disk.
//!
//! Layout: `{"sync": {...}, "local": {...}, "session": {...}}`. Writes replace
//! the file through a temporary sibling and a rename, so readers never see a
//! half-written document.

use super::{
    ConfigStore, StorageArea, StorageChange, StoreError, ValueChange, CHANGE_CHANNEL_CAPACITY,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

type Document = BTreeMap<StorageArea, Map<String, Value>>;

const AREAS: [StorageArea; 3] = [StorageArea::Sync, StorageArea::Local, StorageArea::Session];

/// File-backed settings store.
///
/// The file is the source of truth: other processes may write it too. Every
/// write re-reads it under the lock and merges one key, and [`refresh`]
/// turns edits made elsewhere into change notifications.
///
/// [`refresh`]: JsonFileStore::refresh
pub struct JsonFileStore {
    path: PathBuf,
    /// Document as this store last saw it on disk
    snapshot: Mutex<Document>,
    changes: broadcast::Sender<StorageChange>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening settings store: {}", path.display());

        let document = read_document(&path).await?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { path, snapshot: Mutex::new(document), changes })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drops every key of an area (used to start a fresh session).
    pub async fn clear_area(&self, area: StorageArea) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.lock().await;
        let mut document = read_document(&self.path).await?;
        let external = diff(&snapshot, &document);

        if document.remove(&area).is_some() {
            info!("Cleared {} storage", area);
            self.persist(&document).await?;
        }
        *snapshot = document;
        drop(snapshot);

        self.notify(external);
        Ok(())
    }

    /// Re-reads the file and broadcasts every key that changed since the last
    /// read or write. Returns the number of change notifications sent.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let mut snapshot = self.snapshot.lock().await;
        let document = read_document(&self.path).await?;
        let external = diff(&snapshot, &document);
        *snapshot = document;
        drop(snapshot);

        let count = external.len();
        if count > 0 {
            debug!("Picked up {} external settings changes", count);
        }
        self.notify(external);
        Ok(count)
    }

    /// Spawns a task that calls [`refresh`](Self::refresh) every `interval`.
    pub fn spawn_refresh(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = store.refresh().await {
                    warn!("Settings refresh failed: {}", e);
                }
            }
        })
    }

    fn notify(&self, changes: Vec<StorageChange>) {
        for change in changes {
            let _ = self.changes.send(change);
        }
    }

    async fn persist(&self, document: &Document) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { path: self.path.display().to_string(), source };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(document)
            .map_err(|source| StoreError::Malformed { key: self.path.display().to_string(), source })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

async fn read_document(path: &Path) -> Result<Document, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(Document::new()),
        Ok(content) => serde_json::from_str(&content)
            .map_err(|source| StoreError::Malformed { key: path.display().to_string(), source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
        Err(source) => Err(StoreError::Io { path: path.display().to_string(), source }),
    }
}

/// Per-area changes between two versions of the document.
fn diff(old: &Document, new: &Document) -> Vec<StorageChange> {
    let empty = Map::new();
    let mut result = Vec::new();

    for area in AREAS {
        let before = old.get(&area).unwrap_or(&empty);
        let after = new.get(&area).unwrap_or(&empty);
        let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

        let changes: BTreeMap<String, ValueChange> = keys
            .into_iter()
            .filter(|key| before.get(*key) != after.get(*key))
            .map(|key| {
                let change = ValueChange {
                    old_value: before.get(key).cloned(),
                    new_value: after.get(key).cloned(),
                };
                (key.clone(), change)
            })
            .collect();

        if !changes.is_empty() {
            result.push(StorageChange { area, changes });
        }
    }

    result
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn get(&self, area: StorageArea, key: &str) -> Result<Option<Value>, StoreError> {
        let document = read_document(&self.path).await?;
        Ok(document.get(&area).and_then(|entries| entries.get(key)).cloned())
    }

    async fn set(&self, area: StorageArea, key: &str, value: Value) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.lock().await;
        let mut document = read_document(&self.path).await?;
        let external = diff(&snapshot, &document);

        let old_value = document.entry(area).or_default().insert(key.to_string(), value.clone());
        self.persist(&document).await?;
        *snapshot = document;
        drop(snapshot);

        debug!("{}.{} saved to {}", area, key, self.path.display());
        self.notify(external);
        let _ = self.changes.send(StorageChange::single(area, key, old_value, Some(value)));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("settings.json")).await.unwrap();
        assert_eq!(store.get(StorageArea::Sync, "countryTags").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.set(StorageArea::Sync, "countryTags", json!({"de": "a"})).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get(StorageArea::Sync, "countryTags").await.unwrap(),
            Some(json!({"de": "a"}))
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"sync\""));
    }

    #[tokio::test]
    async fn test_set_broadcasts_change() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("settings.json")).await.unwrap();
        let mut rx = store.subscribe();

        store.set(StorageArea::Local, "k", json!(1)).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert!(change.touches(StorageArea::Local, "k"));
    }

    #[tokio::test]
    async fn test_clear_area() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        store.set(StorageArea::Session, "product", json!({"asin": "B0CTHXMYL8"})).await.unwrap();
        store.set(StorageArea::Sync, "countryTags", json!({})).await.unwrap();

        store.clear_area(StorageArea::Session).await.unwrap();
        assert_eq!(store.get(StorageArea::Session, "product").await.unwrap(), None);
        assert!(store.get(StorageArea::Sync, "countryTags").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonFileStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_two_handles_keep_each_others_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let worker = JsonFileStore::open(&path).await.unwrap();
        let cli = JsonFileStore::open(&path).await.unwrap();

        cli.set(StorageArea::Sync, "discordWebhookUrl", json!("https://discord.test/hook"))
            .await
            .unwrap();
        worker.set(StorageArea::Sync, "countryTags", json!({"de": "a"})).await.unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get(StorageArea::Sync, "discordWebhookUrl").await.unwrap(),
            Some(json!("https://discord.test/hook"))
        );
        assert_eq!(
            reopened.get(StorageArea::Sync, "countryTags").await.unwrap(),
            Some(json!({"de": "a"}))
        );
    }

    #[tokio::test]
    async fn test_get_sees_writes_from_another_handle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let worker = JsonFileStore::open(&path).await.unwrap();
        let cli = JsonFileStore::open(&path).await.unwrap();

        cli.set(StorageArea::Sync, "countryTags", json!({"fr": "b"})).await.unwrap();
        assert_eq!(
            worker.get(StorageArea::Sync, "countryTags").await.unwrap(),
            Some(json!({"fr": "b"}))
        );
    }

    #[tokio::test]
    async fn test_refresh_broadcasts_external_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let worker = JsonFileStore::open(&path).await.unwrap();
        let cli = JsonFileStore::open(&path).await.unwrap();
        let mut rx = worker.subscribe();

        assert_eq!(worker.refresh().await.unwrap(), 0);

        cli.set(StorageArea::Sync, "countryTags", json!({"de": "a"})).await.unwrap();
        assert_eq!(worker.refresh().await.unwrap(), 1);

        let change = rx.recv().await.unwrap();
        assert!(change.touches(StorageArea::Sync, "countryTags"));
        assert_eq!(change.changes["countryTags"].old_value, None);
        assert_eq!(change.changes["countryTags"].new_value, Some(json!({"de": "a"})));

        // Already seen: nothing more to report.
        assert_eq!(worker.refresh().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawned_refresh_follows_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let worker = Arc::new(JsonFileStore::open(&path).await.unwrap());
        let mut rx = worker.subscribe();
        let handle = worker.spawn_refresh(Duration::from_millis(5));

        let cli = JsonFileStore::open(&path).await.unwrap();
        cli.set(StorageArea::Sync, "countryTags", json!({"it": "c"})).await.unwrap();

        let change = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        handle.abort();
        assert!(change.touches(StorageArea::Sync, "countryTags"));
    }

    #[test]
    fn test_diff_reports_removed_keys() {
        let mut old = Document::new();
        old.entry(StorageArea::Session).or_default().insert("product".into(), json!({}));
        old.entry(StorageArea::Sync).or_default().insert("countryTags".into(), json!({}));
        let mut new = old.clone();
        new.remove(&StorageArea::Session);

        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].touches(StorageArea::Session, "product"));
        assert_eq!(changes[0].changes["product"].new_value, None);
    }
}
