//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::amazon::navigation::PollPolicy;
use crate::rules::compiler::RuleStrategy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the platform config and data directories.
pub const APP_DIR: &str = "amz-affiliate";

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Marketplace catalog file; the bundled catalog is used when unset
    #[serde(default)]
    pub marketplaces: Option<PathBuf>,

    /// Directory holding settings and installed rules
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// How compiled rules rewrite navigations
    #[serde(default)]
    pub rule_strategy: RuleStrategy,

    /// Product report endpoint
    #[serde(default)]
    pub api_url: Option<String>,

    /// Key sent as `x-api-key` with product reports
    #[serde(default)]
    pub api_key: Option<String>,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Polls while waiting for a product page to settle
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Delay between page polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_attempts() -> u32 {
    30
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            marketplaces: None,
            data_dir: None,
            rule_strategy: RuleStrategy::default(),
            api_url: None,
            api_key: None,
            proxy: None,
            format: OutputFormat::Table,
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("amz-affiliate.toml");
        if local_config.exists() {
            debug!("Found amz-affiliate.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join(APP_DIR).join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("AMZ_AFFILIATE_API_URL") {
            self.api_url = Some(url);
        }

        if let Ok(key) = std::env::var("AMZ_AFFILIATE_API_KEY") {
            self.api_key = Some(key);
        }

        if let Ok(dir) = std::env::var("AMZ_AFFILIATE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(proxy) = std::env::var("AMZ_PROXY") {
            self.proxy = Some(proxy);
        }

        self
    }

    /// Resolves the data directory: configured, platform data dir, or `./.amz-affiliate`.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".amz-affiliate"))
    }

    /// Path of the settings document inside the data directory.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir().join("settings.json")
    }

    /// Page polling policy for client-side navigation.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_attempts, self.poll_interval_ms)
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use: table, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
