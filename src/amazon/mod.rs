//! Amazon-specific modules: marketplaces, product page parsing and fetching.

pub mod client;
pub mod marketplaces;
pub mod models;
pub mod navigation;
pub mod parser;
pub mod selectors;

pub use client::AmazonClient;
pub use marketplaces::{BundledCatalog, FileCatalog, Marketplace, MarketplaceSource};
pub use models::ProductRecord;
pub use navigation::{PageSource, PollPolicy};
pub use parser::Parser;
