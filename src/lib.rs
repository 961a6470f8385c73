//! amz-affiliate - Amazon affiliate-tag redirect rules, product capture and margin reporting
//!
//! Tags configured per marketplace compile into declarative redirect rules
//! that a host engine applies to product navigations. A single-flight
//! synchronizer keeps the installed rules in step with the configured tags.

pub mod amazon;
pub mod background;
pub mod commands;
pub mod config;
pub mod engine;
pub mod format;
pub mod report;
pub mod rules;
pub mod store;
pub mod sync;

pub use amazon::{Marketplace, ProductRecord};
pub use config::Config;
pub use rules::{compile, RedirectRule, RuleStrategy};
pub use store::TagMapping;
pub use sync::{RuleSynchronizer, SyncError, SyncReport};
