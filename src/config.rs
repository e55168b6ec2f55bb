//! Configuration module for newswire.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::catalog::DEFAULT_SOURCES;
use crate::feed::ITEMS_PER_FETCH;
use crate::{NewswireError, Result};

/// Poll scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum number of channels processed concurrently within one cycle.
    #[serde(default = "default_max_concurrent_channels")]
    pub max_concurrent_channels: usize,
    /// Run a cycle immediately at startup instead of waiting one interval.
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
}

fn default_poll_interval() -> u64 {
    3600 // 1 hour
}

fn default_max_concurrent_channels() -> usize {
    4
}

fn default_run_on_startup() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_concurrent_channels: default_max_concurrent_channels(),
            run_on_startup: default_run_on_startup(),
        }
    }
}

/// Feed fetcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User agent sent with every feed request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_user_agent() -> String {
    format!("newswire/{} (feed relay)", env!("CARGO_PKG_VERSION"))
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Two JSON files in `data_dir`.
    Json,
    /// SQLite database at `sqlite_path`.
    Sqlite,
    /// Process memory only (nothing survives a restart).
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Which backend holds subscriptions and the ledger.
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// Directory for the JSON backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Database file for the SQLite backend.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Json
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_sqlite_path() -> String {
    "data/newswire.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            data_dir: default_data_dir(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

/// Dedup ledger configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    /// Keep only this many most recent item ids per channel. Unset means unbounded.
    /// Must cover one cycle's window (`ITEMS_PER_FETCH` per catalog source).
    #[serde(default)]
    pub max_ids_per_channel: Option<usize>,
}

/// Delivery transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    /// Post to per-channel chat webhooks.
    Webhook,
    /// Write deliveries to the log only.
    Log,
}

/// Delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Transport used to post messages.
    #[serde(default = "default_delivery_kind")]
    pub kind: DeliveryKind,
    /// Webhook URL per channel id.
    #[serde(default)]
    pub webhooks: BTreeMap<String, String>,
    /// Timeout for a single send in seconds.
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,
}

fn default_delivery_kind() -> DeliveryKind {
    DeliveryKind::Webhook
}

fn default_delivery_timeout() -> u64 {
    10
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            kind: default_delivery_kind(),
            webhooks: BTreeMap::new(),
            timeout_secs: default_delivery_timeout(),
        }
    }
}

/// Web (status + command API) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Whether the HTTP server is started.
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number.
    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_web_enabled() -> bool {
    true
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8080
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file, written in addition to stdout.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// One catalog entry as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
}

fn default_catalog() -> Vec<CatalogEntry> {
    DEFAULT_SOURCES
        .iter()
        .map(|(name, url)| CatalogEntry {
            name: name.to_string(),
            url: url.to_string(),
        })
        .collect()
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Fetcher configuration.
    #[serde(default)]
    pub fetcher: FetcherConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Delivery configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Web configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Fixed feed catalog.
    #[serde(default = "default_catalog")]
    pub catalog: Vec<CatalogEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            fetcher: FetcherConfig::default(),
            storage: StorageConfig::default(),
            ledger: LedgerConfig::default(),
            delivery: DeliveryConfig::default(),
            web: WebConfig::default(),
            logging: LoggingConfig::default(),
            catalog: default_catalog(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(NewswireError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| NewswireError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `NEWSWIRE_DATA_DIR`: directory for the JSON store
    /// - `NEWSWIRE_WEB_PORT`: HTTP port (ignored unless it parses as a port)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("NEWSWIRE_DATA_DIR") {
            if !dir.is_empty() {
                self.storage.data_dir = dir;
            }
        }
        if let Ok(port) = std::env::var("NEWSWIRE_WEB_PORT") {
            if let Ok(port) = port.parse() {
                self.web.port = port;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.poll_interval_secs == 0 {
            return Err(NewswireError::Config(
                "scheduler.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.scheduler.max_concurrent_channels == 0 {
            return Err(NewswireError::Config(
                "scheduler.max_concurrent_channels must be greater than zero".to_string(),
            ));
        }
        if self.ledger.max_ids_per_channel == Some(0) {
            return Err(NewswireError::Config(
                "ledger.max_ids_per_channel must be greater than zero when set".to_string(),
            ));
        }
        if self.catalog.is_empty() {
            return Err(NewswireError::Config("catalog is empty".to_string()));
        }

        // A cap smaller than one cycle's window evicts ids still in the feed,
        // which are then sent again on the next cycle.
        let window = ITEMS_PER_FETCH * self.catalog.len();
        if let Some(cap) = self.ledger.max_ids_per_channel {
            if cap < window {
                return Err(NewswireError::Config(format!(
                    "ledger.max_ids_per_channel must be at least {window} ({ITEMS_PER_FETCH} items x {} catalog sources)",
                    self.catalog.len()
                )));
            }
        }

        let mut names = HashSet::new();
        let mut urls = HashSet::new();
        for entry in &self.catalog {
            if !names.insert(entry.name.as_str()) {
                return Err(NewswireError::Config(format!(
                    "duplicate catalog name: {}",
                    entry.name
                )));
            }
            if !urls.insert(entry.url.as_str()) {
                return Err(NewswireError::Config(format!(
                    "duplicate catalog url: {}",
                    entry.url
                )));
            }
            validate_http_url(&entry.url)
                .map_err(|e| NewswireError::Config(format!("catalog entry {}: {e}", entry.name)))?;
        }

        for (channel, webhook) in &self.delivery.webhooks {
            validate_http_url(webhook)
                .map_err(|e| NewswireError::Config(format!("webhook for {channel}: {e}")))?;
        }

        Ok(())
    }
}

/// Check that a string is an absolute http(s) URL with a host.
pub fn validate_http_url(raw: &str) -> std::result::Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid URL: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(format!("unsupported URL scheme: {scheme}")),
    }
    if parsed.host().is_none() {
        return Err("URL has no host".to_string());
    }
    Ok(())
}
