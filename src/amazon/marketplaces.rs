//! Amazon marketplaces (country storefronts) and the catalog they are loaded from.
//!
//! The catalog is a small JSON document of the form `{"options": [{id, domain, label}]}`.
//! A copy is compiled into the binary; a file on disk can replace it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Catalog bundled with the crate.
const BUNDLED_CATALOG: &str = include_str!("../../assets/marketplaces.json");

/// A single Amazon country storefront.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marketplace {
    /// Short identifier used as the key of the tag mapping (e.g. `de`)
    pub id: String,
    /// Registrable domain without any subdomain (e.g. `amazon.de`)
    pub domain: String,
    /// Human readable label
    pub label: String,
}

impl Marketplace {
    /// Creates a marketplace entry.
    pub fn new(id: impl Into<String>, domain: impl Into<String>, label: impl Into<String>) -> Self {
        Self { id: id.into(), domain: domain.into(), label: label.into() }
    }

    /// Returns the storefront base URL.
    pub fn base_url(&self) -> String {
        format!("https://www.{}", self.domain)
    }

    /// Returns the canonical product URL for an ASIN.
    pub fn product_url(&self, asin: &str) -> String {
        format!("{}/dp/{}", self.base_url(), asin)
    }

    /// Returns the canonical affiliate-tagged product URL.
    ///
    /// This is the same shape the redirect rules rewrite product pages into.
    pub fn tagged_product_url(&self, asin: &str, tag: &str) -> String {
        format!("{}/dp/{}/ref=nosim?tag={}", self.base_url(), asin, urlencoding::encode(tag))
    }

    /// Returns true if the URL's host is this domain or one of its subdomains.
    pub fn matches_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        match parsed.host_str() {
            Some(host) => {
                let host = host.to_ascii_lowercase();
                host == self.domain || host.ends_with(&format!(".{}", self.domain))
            }
            None => false,
        }
    }

    /// Returns the flag emoji for this marketplace.
    pub fn flag(&self) -> &'static str {
        country_flag(&self.id)
    }

    /// Returns the Accept-Language header value used when fetching pages.
    pub fn accept_language(&self) -> &'static str {
        match self.id.to_lowercase().as_str() {
            "uk" | "gb" => "en-GB,en;q=0.9",
            "de" => "de-DE,de;q=0.9,en;q=0.8",
            "fr" => "fr-FR,fr;q=0.9,en;q=0.8",
            "es" | "mx" => "es-ES,es;q=0.9,en;q=0.8",
            "it" => "it-IT,it;q=0.9,en;q=0.8",
            "jp" => "ja-JP,ja;q=0.9,en;q=0.8",
            "nl" => "nl-NL,nl;q=0.9,en;q=0.8",
            "se" => "sv-SE,sv;q=0.9,en;q=0.8",
            "pl" => "pl-PL,pl;q=0.9,en;q=0.8",
            _ => "en-US,en;q=0.9",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.domain)
    }
}

/// Country code to flag emoji mapping.
pub fn country_flag(code: &str) -> &'static str {
    match code.to_lowercase().as_str() {
        "de" => "🇩🇪",
        "es" => "🇪🇸",
        "fr" => "🇫🇷",
        "it" => "🇮🇹",
        "nl" => "🇳🇱",
        "be" => "🇧🇪",
        "pl" => "🇵🇱",
        "se" => "🇸🇪",
        "uk" | "gb" => "🇬🇧",
        _ => "🌍",
    }
}

/// Finds the marketplace whose domain serves the given URL.
pub fn find_by_url<'a>(marketplaces: &'a [Marketplace], url: &str) -> Option<&'a Marketplace> {
    marketplaces.iter().find(|m| m.matches_url(url))
}

/// Errors raised while loading the marketplace catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read marketplace catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse marketplace catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid marketplace catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    options: Vec<Marketplace>,
}

/// Parses and validates a catalog document.
pub fn parse_catalog(json: &str) -> Result<Vec<Marketplace>, CatalogError> {
    let document: CatalogDocument = serde_json::from_str(json)?;
    let mut seen = HashSet::new();

    for option in &document.options {
        if option.id.trim().is_empty() {
            return Err(CatalogError::Invalid("marketplace with empty id".to_string()));
        }
        if option.domain.trim().is_empty() {
            return Err(CatalogError::Invalid(format!("marketplace '{}' has no domain", option.id)));
        }
        if !seen.insert(option.id.as_str()) {
            return Err(CatalogError::Invalid(format!("duplicate marketplace id '{}'", option.id)));
        }
    }

    Ok(document.options)
}

/// Somewhere the marketplace list can be loaded from.
#[async_trait]
pub trait MarketplaceSource: Send + Sync {
    /// Loads the full, ordered marketplace list.
    async fn load(&self) -> Result<Vec<Marketplace>, CatalogError>;
}

/// The catalog compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledCatalog;

impl BundledCatalog {
    /// Parses the bundled catalog synchronously.
    pub fn marketplaces() -> Result<Vec<Marketplace>, CatalogError> {
        parse_catalog(BUNDLED_CATALOG)
    }
}

#[async_trait]
impl MarketplaceSource for BundledCatalog {
    async fn load(&self) -> Result<Vec<Marketplace>, CatalogError> {
        debug!("Loading bundled marketplace catalog");
        Self::marketplaces()
    }
}

/// A catalog read from a JSON file.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    /// Creates a catalog source for the given path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

#[async_trait]
impl MarketplaceSource for FileCatalog {
    async fn load(&self) -> Result<Vec<Marketplace>, CatalogError> {
        debug!("Loading marketplace catalog from: {}", self.path.display());

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CatalogError::Read { path: self.path.clone(), source })?;

        parse_catalog(&content)
    }
}
