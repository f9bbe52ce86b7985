//! Runtime configuration for the tracker.
//!
//! Every tunable of the pipeline lives here: upstream addresses and
//! credentials, page sizes, polling intervals, retention thresholds and
//! dashboard windows. Values come from a TOML file, fall back to defaults
//! when the file is absent, and secrets can be overridden from the environment.

use crate::error::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "mint-pulse.toml";

pub const ENV_FEED_API_KEY: &str = "MINT_PULSE_FEED_API_KEY";
pub const ENV_FEED_TOKEN_ID: &str = "MINT_PULSE_FEED_TOKEN_ID";
pub const ENV_RPC_API_KEY: &str = "MINT_PULSE_RPC_API_KEY";

/// Top-level tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub storage: StorageConfig,
    pub feed: FeedConfig,
    pub holders: HoldersConfig,
    pub retention: RetentionConfig,
    pub dashboard: DashboardConfig,
    pub transport: TransportConfig,
    /// tracing max level: trace, debug, info, warn or error
    pub log_level: String,
}

/// Locations of the three persisted stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub registry_file: String,
    pub history_file: String,
    pub cursor_file: String,
    pub inactive_file: String,
}

/// Event feed (webhook request log) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub token_id: String,
    pub api_key: Option<String>,
    pub page_size: u32,
    /// Case-insensitive suffix a mint must carry to be tracked
    pub mint_suffix: String,
    pub poll_interval_secs: u64,
}

/// Holder-enumeration RPC settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HoldersConfig {
    pub rpc_url: String,
    pub api_key: Option<String>,
    pub page_size: u32,
    pub poll_interval_secs: u64,
    pub max_concurrent_mints: usize,
    pub requests_per_second: u32,
}

/// Rule that stops snapshotting mints that fail to gain holders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    pub grace_period_secs: u64,
    pub min_holders: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub listen_addr: String,
    pub windows_secs: Vec<u64>,
    /// Client-side refresh period of the HTML page
    pub refresh_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub timeout_secs: u64,
    /// Extra attempts per page fetch before it counts as failed
    pub retry_attempts: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            feed: FeedConfig::default(),
            holders: HoldersConfig::default(),
            retention: RetentionConfig::default(),
            dashboard: DashboardConfig::default(),
            transport: TransportConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            registry_file: "mint_addresses.json".to_string(),
            history_file: "holder_data.json".to_string(),
            cursor_file: "last_processed_id.txt".to_string(),
            inactive_file: "inactive_mints.json".to_string(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://webhook.site".to_string(),
            token_id: String::new(),
            api_key: None,
            page_size: 100,
            mint_suffix: "pump".to_string(),
            poll_interval_secs: 10,
        }
    }
}

impl Default for HoldersConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://mainnet.helius-rpc.com".to_string(),
            api_key: None,
            page_size: 1000,
            poll_interval_secs: 10,
            max_concurrent_mints: 1,
            requests_per_second: 10,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 60,
            min_holders: 10,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            windows_secs: vec![60, 180, 300],
            refresh_secs: 10,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            retry_attempts: 2,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults. Environment overrides are applied
    /// and the result is validated in both cases.
    pub fn load_from_path(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref();
        let config = match Self::read_file(path)? {
            Some(config) => config,
            None => {
                warn!("Config file '{}' not found, using default values", path.display());
                Self::default()
            }
        };
        config.finalize()
    }

    /// Read and parse a TOML file without logging. `Ok(None)` when the file
    /// does not exist.
    pub fn read_file(path: impl AsRef<Path>) -> TrackerResult<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents).map(Some)
    }

    /// Apply environment overrides and validate.
    pub fn finalize(mut self) -> TrackerResult<Self> {
        self.apply_env_overrides(|key| std::env::var(key).ok());
        self.validate()?;
        Ok(self)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> TrackerResult<Self> {
        toml::from_str(contents).map_err(|e| TrackerError::Config(e.to_string()))
    }

    /// Override secrets from the environment. `lookup` is injected so tests
    /// don't have to mutate the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_FEED_API_KEY).filter(|v| !v.is_empty()) {
            self.feed.api_key = Some(key);
        }
        if let Some(token) = lookup(ENV_FEED_TOKEN_ID).filter(|v| !v.is_empty()) {
            self.feed.token_id = token;
        }
        if let Some(key) = lookup(ENV_RPC_API_KEY).filter(|v| !v.is_empty()) {
            self.holders.api_key = Some(key);
        }
    }

    /// Reject values that would stall or break a polling loop.
    pub fn validate(&self) -> TrackerResult<()> {
        if self.feed.page_size == 0 {
            return Err(TrackerError::Config("feed.page_size must be positive".to_string()));
        }
        if self.holders.page_size == 0 {
            return Err(TrackerError::Config("holders.page_size must be positive".to_string()));
        }
        if self.feed.poll_interval_secs == 0 || self.holders.poll_interval_secs == 0 {
            return Err(TrackerError::Config("poll intervals must be positive".to_string()));
        }
        if self.holders.requests_per_second == 0 {
            return Err(TrackerError::Config("holders.requests_per_second must be positive".to_string()));
        }
        if self.dashboard.windows_secs.is_empty() {
            return Err(TrackerError::Config("dashboard.windows_secs must not be empty".to_string()));
        }
        if self.dashboard.windows_secs.contains(&0) {
            return Err(TrackerError::Config("dashboard window sizes must be positive".to_string()));
        }
        Ok(())
    }

    pub fn registry_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.registry_file)
    }

    pub fn history_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.history_file)
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.cursor_file)
    }

    pub fn inactive_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.inactive_file)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.timeout_secs)
    }

    pub fn windows(&self) -> Vec<Duration> {
        self.dashboard
            .windows_secs
            .iter()
            .map(|secs| Duration::from_secs(*secs))
            .collect()
    }
}
