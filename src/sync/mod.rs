//! Keeps the host engine's redirect rules in step with the configured tags.

pub mod error;
pub mod synchronizer;
pub mod watcher;

pub use error::SyncError;
pub use synchronizer::{RuleSynchronizer, SyncReport};
pub use watcher::ChangeWatcher;
