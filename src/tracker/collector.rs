//! Holder snapshot collection with the retention policy.
//!
//! Every cycle enumerates the holders of each registered, still-active mint
//! and appends a timestamped snapshot to its history. A mint that has not
//! reached `min_holders` once `grace_period_secs` have passed since its first
//! snapshot is frozen: its history is kept, but it is never polled again.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{HoldersConfig, RetentionConfig};
use crate::error::TrackerResult;
use crate::tracker::clock::Clock;
use crate::tracker::holders::{count_distinct_owners, HolderSource};
use crate::tracker::scheduler::PollTask;
use crate::tracker::storage::{recover_malformed, HolderHistoryStore, MintRegistryStore};
use crate::types::{MintId, Snapshot};

/// Decision for one fresh holder count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionDecision {
    /// No history yet: record unconditionally
    FirstObservation,
    Append,
    /// Grace period over and still below the holder threshold
    Deactivate,
}

/// Apply the retention policy to a holder count observed at `now_ms`, given
/// the timestamp of the mint's first snapshot.
pub fn retention_decision(
    first_seen_ms: Option<u64>,
    now_ms: u64,
    holders: u64,
    policy: &RetentionConfig,
) -> RetentionDecision {
    let first_seen_ms = match first_seen_ms {
        Some(ts) => ts,
        None => return RetentionDecision::FirstObservation,
    };

    let elapsed_ms = now_ms.saturating_sub(first_seen_ms);
    let grace_ms = policy.grace_period_secs.saturating_mul(1_000);
    if elapsed_ms > grace_ms && holders < policy.min_holders {
        RetentionDecision::Deactivate
    } else {
        RetentionDecision::Append
    }
}

/// Result of a single collection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOutcome {
    /// Active mints whose holders were enumerated
    pub mints_polled: usize,
    /// Registered mints skipped because they are frozen
    pub mints_inactive: usize,
    pub first_observations: usize,
    pub snapshots_appended: usize,
    pub deactivated: Vec<MintId>,
    /// Mints whose enumeration failed this cycle
    pub failed: usize,
}

impl CollectionOutcome {
    /// Mints that received a new snapshot, first observations included.
    pub fn updated(&self) -> usize {
        self.first_observations + self.snapshots_appended
    }
}

/// Polls holder counts for every active mint and maintains the history.
pub struct SnapshotCollector {
    registry: Arc<dyn MintRegistryStore>,
    history: Arc<dyn HolderHistoryStore>,
    holders: Arc<dyn HolderSource>,
    clock: Arc<dyn Clock>,
    retention: RetentionConfig,
    page_size: u32,
    max_concurrent_mints: usize,
}

impl SnapshotCollector {
    pub fn new(
        registry: Arc<dyn MintRegistryStore>,
        history: Arc<dyn HolderHistoryStore>,
        holders: Arc<dyn HolderSource>,
        clock: Arc<dyn Clock>,
        holders_config: &HoldersConfig,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            registry,
            history,
            holders,
            clock,
            retention,
            page_size: holders_config.page_size,
            max_concurrent_mints: holders_config.max_concurrent_mints.max(1),
        }
    }

    /// Run one collection cycle.
    ///
    /// The registry is read-only here, so an unreadable registry just means
    /// nothing to poll. The history and inactive set are owned by the
    /// collector: a malformed document starts over from empty, but an I/O
    /// failure aborts the cycle so the files are never overwritten blind.
    #[instrument(skip(self))]
    pub async fn collect_once(&self) -> TrackerResult<CollectionOutcome> {
        let registry = match self.registry.load_registry().await {
            Ok(mints) => mints,
            Err(e) => {
                warn!("Could not read mint registry, treating as empty: {}", e);
                Vec::new()
            }
        };
        let mut history = recover_malformed(self.history.load_history().await, "holder history")?;
        let mut inactive: BTreeSet<MintId> =
            recover_malformed(self.history.load_inactive().await, "inactive mints")?;
        let now_ms = self.clock.now_millis();

        let mut outcome = CollectionOutcome::default();
        let mut seen: HashSet<MintId> = HashSet::new();
        let mut active: Vec<MintId> = Vec::new();
        for mint in registry {
            if !seen.insert(mint.clone()) {
                continue;
            }
            if inactive.contains(&mint) {
                outcome.mints_inactive += 1;
            } else {
                active.push(mint);
            }
        }
        outcome.mints_polled = active.len();

        let page_size = self.page_size;
        let counts: Vec<(MintId, TrackerResult<u64>)> = stream::iter(active)
            .map(|mint| {
                let source = self.holders.clone();
                async move {
                    let count = count_distinct_owners(source.as_ref(), &mint, page_size).await;
                    (mint, count)
                }
            })
            .buffered(self.max_concurrent_mints)
            .collect()
            .await;

        for (mint, count) in counts {
            let holders = match count {
                Ok(holders) => holders,
                Err(e) => {
                    warn!("Error fetching token holders for mint {}: {}", mint, e);
                    outcome.failed += 1;
                    continue;
                }
            };

            let snapshots = history.entry(mint.clone()).or_default();
            let first_seen = snapshots.first().map(|s| s.timestamp);

            match retention_decision(first_seen, now_ms, holders, &self.retention) {
                RetentionDecision::FirstObservation => {
                    snapshots.push(Snapshot::new(now_ms, holders));
                    outcome.first_observations += 1;
                    debug!("Started tracking {} with {} holders", mint, holders);
                }
                RetentionDecision::Append => {
                    let last = snapshots.last().map(|s| s.timestamp).unwrap_or(0);
                    if now_ms < last {
                        warn!("Clock is behind the last snapshot of {}, not appending", mint);
                        continue;
                    }
                    snapshots.push(Snapshot::new(now_ms, holders));
                    outcome.snapshots_appended += 1;
                }
                RetentionDecision::Deactivate => {
                    info!(
                        "Stopped tracking {} as it did not reach {} holders in {}s",
                        mint, self.retention.min_holders, self.retention.grace_period_secs
                    );
                    inactive.insert(mint.clone());
                    outcome.deactivated.push(mint);
                }
            }
        }

        if outcome.updated() > 0 {
            self.history.save_history(&history).await?;
        }
        if !outcome.deactivated.is_empty() {
            self.history.save_inactive(&inactive).await?;
        }

        Ok(outcome)
    }
}

#[async_trait]
impl PollTask for SnapshotCollector {
    fn name(&self) -> &'static str {
        "collector"
    }

    async fn run_iteration(&self) -> TrackerResult<()> {
        let outcome = self.collect_once().await?;
        info!(
            "Updated holder data at {}. Mints updated: {} ({} new, {} deactivated, {} failed, {} inactive)",
            chrono::Utc::now().to_rfc3339(),
            outcome.updated(),
            outcome.first_observations,
            outcome.deactivated.len(),
            outcome.failed,
            outcome.mints_inactive
        );
        Ok(())
    }
}
