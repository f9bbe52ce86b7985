//! Tracker module - the three-stage holder tracking pipeline.
//!
//! Discovery feeds the mint registry, the collector turns the registry into
//! per-mint holder histories, and the dashboard ranks growth rates from those
//! histories. The stages share nothing but the stores in `storage`.

pub mod clock;
pub mod collector;
pub mod dashboard;
pub mod discovery;
pub mod feed;
pub mod holders;
pub mod rate_limit;
pub mod rates;
pub mod scheduler;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collector::{retention_decision, CollectionOutcome, RetentionDecision, SnapshotCollector};
pub use dashboard::{dashboard_router, render_page, string_to_color, DashboardState, Hsl};
pub use discovery::{merge_mints, DiscoveryOutcome, MintDiscovery};
pub use feed::{extract_mints, EventFeed, FeedEvent, WebhookFeedClient};
pub use holders::{count_distinct_owners, HolderSource, TokenAccountsClient};
pub use rate_limit::RequestLimiter;
pub use rates::{buy_rate, compute_report, rank_window};
pub use scheduler::{PollTask, Poller, TickOutcome};
pub use storage::{
    recover_malformed, CursorStore, HolderHistoryStore, JsonFileStore, MemoryStore, MintRegistryStore,
};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::TrackerConfig;
use crate::error::TrackerResult;

/// The assembled pipeline: two polling components plus the dashboard state.
pub struct Tracker {
    pub config: TrackerConfig,
    pub discovery: Arc<MintDiscovery>,
    pub collector: Arc<SnapshotCollector>,
    pub dashboard: DashboardState,
}

/// Injected collaborators for `Tracker::from_parts`.
pub struct TrackerParts {
    pub cursor: Arc<dyn CursorStore>,
    pub registry: Arc<dyn MintRegistryStore>,
    pub history: Arc<dyn HolderHistoryStore>,
    pub feed: Arc<dyn EventFeed>,
    pub holders: Arc<dyn HolderSource>,
    pub clock: Arc<dyn Clock>,
}

impl Tracker {
    /// Wire the components from explicit collaborators.
    pub fn from_parts(config: TrackerConfig, parts: TrackerParts) -> Self {
        let discovery = Arc::new(MintDiscovery::new(
            parts.feed,
            parts.cursor,
            parts.registry.clone(),
            &config.feed,
        ));

        let collector = Arc::new(SnapshotCollector::new(
            parts.registry,
            parts.history.clone(),
            parts.holders,
            parts.clock.clone(),
            &config.holders,
            config.retention.clone(),
        ));

        let dashboard = DashboardState::new(
            parts.history,
            parts.clock,
            config.windows(),
            config.dashboard.refresh_secs,
        );

        Self {
            config,
            discovery,
            collector,
            dashboard,
        }
    }

    pub fn discovery_poller(&self) -> Poller {
        Poller::new(
            self.discovery.clone(),
            Duration::from_secs(self.config.feed.poll_interval_secs),
        )
    }

    pub fn collector_poller(&self) -> Poller {
        Poller::new(
            self.collector.clone(),
            Duration::from_secs(self.config.holders.poll_interval_secs),
        )
    }
}

/// Tracker builder for convenient construction with sensible defaults.
pub struct TrackerBuilder {
    config: TrackerConfig,
}

impl TrackerBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
        }
    }

    /// Start from an already loaded configuration.
    pub fn from_config(config: TrackerConfig) -> Self {
        Self { config }
    }

    /// Set the directory holding the store files.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage.data_dir = dir.into();
        self
    }

    /// Set the event feed token and API key.
    pub fn with_feed(mut self, token_id: impl Into<String>, api_key: Option<String>) -> Self {
        self.config.feed.token_id = token_id.into();
        self.config.feed.api_key = api_key;
        self
    }

    /// Set the holder-enumeration RPC endpoint and API key.
    pub fn with_rpc(mut self, rpc_url: impl Into<String>, api_key: Option<String>) -> Self {
        self.config.holders.rpc_url = rpc_url.into();
        self.config.holders.api_key = api_key;
        self
    }

    /// Set the mint suffix filter.
    pub fn with_mint_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.feed.mint_suffix = suffix.into();
        self
    }

    /// Set the retention grace period and holder threshold.
    pub fn with_retention(mut self, grace_period_secs: u64, min_holders: u64) -> Self {
        self.config.retention.grace_period_secs = grace_period_secs;
        self.config.retention.min_holders = min_holders;
        self
    }

    /// Set the dashboard windows, in seconds.
    pub fn with_windows(mut self, windows_secs: Vec<u64>) -> Self {
        self.config.dashboard.windows_secs = windows_secs;
        self
    }

    /// Set the polling interval of both loops.
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.config.feed.poll_interval_secs = secs;
        self.config.holders.poll_interval_secs = secs;
        self
    }

    /// Set how many mints are enumerated concurrently.
    pub fn with_max_concurrent_mints(mut self, max: usize) -> Self {
        self.config.holders.max_concurrent_mints = max;
        self
    }

    /// Build the configuration only.
    pub fn build_config(self) -> TrackerConfig {
        self.config
    }

    /// Build a tracker backed by JSON files, the HTTP clients and the system clock.
    pub fn build(self) -> TrackerResult<Tracker> {
        self.config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(self.config.request_timeout())
            .build()?;

        let store = Arc::new(JsonFileStore::from_config(&self.config));
        let parts = TrackerParts {
            cursor: store.clone(),
            registry: store.clone(),
            history: store,
            feed: Arc::new(WebhookFeedClient::new(http.clone(), &self.config)),
            holders: Arc::new(TokenAccountsClient::new(http, &self.config)),
            clock: Arc::new(SystemClock),
        };

        info!(
            "Created tracker with data dir {}",
            self.config.storage.data_dir.display()
        );
        Ok(Tracker::from_parts(self.config, parts))
    }

    /// Build a tracker from injected collaborators.
    pub fn build_with(self, parts: TrackerParts) -> TrackerResult<Tracker> {
        self.config.validate()?;
        Ok(Tracker::from_parts(self.config, parts))
    }
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
