//! Mint discovery - incremental harvesting of mint identifiers from the event feed.
//!
//! Each poll walks the feed newest-first until it meets the cursor (the
//! newest event handled by the previous poll) or runs out of events, merges
//! eligible mints into the registry and moves the cursor to the newest event
//! seen. A failed page fetch aborts the poll before anything is committed,
//! so the next poll starts again from the last good cursor.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::FeedConfig;
use crate::error::TrackerResult;
use crate::tracker::feed::{extract_mints, EventFeed};
use crate::tracker::scheduler::PollTask;
use crate::tracker::storage::{recover_malformed, CursorStore, MintRegistryStore};
use crate::types::MintId;

/// Result of a single discovery poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    pub pages_fetched: u32,
    /// New events examined (events at or after the cursor excluded)
    pub events_scanned: usize,
    /// Events whose payload could not be parsed
    pub events_skipped: usize,
    /// Distinct eligible mints referenced by the new events
    pub mints_found: usize,
    /// Mints that were not yet in the registry
    pub mints_added: usize,
    /// New cursor value, when it moved
    pub cursor: Option<String>,
}

/// Polls the event feed and grows the mint registry.
pub struct MintDiscovery {
    feed: Arc<dyn EventFeed>,
    cursor_store: Arc<dyn CursorStore>,
    registry: Arc<dyn MintRegistryStore>,
    page_size: u32,
    mint_suffix: String,
}

impl MintDiscovery {
    pub fn new(
        feed: Arc<dyn EventFeed>,
        cursor_store: Arc<dyn CursorStore>,
        registry: Arc<dyn MintRegistryStore>,
        config: &FeedConfig,
    ) -> Self {
        Self {
            feed,
            cursor_store,
            registry,
            page_size: config.page_size,
            mint_suffix: config.mint_suffix.clone(),
        }
    }

    /// Run one discovery poll.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> TrackerResult<DiscoveryOutcome> {
        let cursor = self.cursor_store.load_cursor().await?;
        let mut outcome = DiscoveryOutcome::default();
        let mut newest_event: Option<String> = None;
        let mut seen: HashSet<MintId> = HashSet::new();
        let mut discovered: Vec<MintId> = Vec::new();
        let mut page = 1;

        'paging: loop {
            let events = self.feed.fetch_page(page, self.page_size).await?;
            outcome.pages_fetched += 1;
            if events.is_empty() {
                break;
            }

            for event in &events {
                if !cursor.is_empty() && event.id == cursor {
                    debug!("Reached last processed event {} on page {}", cursor, page);
                    break 'paging;
                }

                if newest_event.is_none() {
                    newest_event = Some(event.id.clone());
                }
                outcome.events_scanned += 1;

                match extract_mints(event, &self.mint_suffix) {
                    Ok(mints) => {
                        for mint in mints {
                            if seen.insert(mint.clone()) {
                                discovered.push(mint);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Skipping feed event {}: {}", event.id, e);
                        outcome.events_skipped += 1;
                    }
                }
            }

            page += 1;
        }

        outcome.mints_found = discovered.len();

        if !discovered.is_empty() {
            let existing = recover_malformed(self.registry.load_registry().await, "mint registry")?;
            let (merged, added) = merge_mints(existing, discovered);
            if added > 0 {
                self.registry.save_registry(&merged).await?;
                info!("Updated mint addresses. Total unique addresses: {}", merged.len());
            }
            outcome.mints_added = added;
        }

        if let Some(newest) = newest_event {
            self.cursor_store.save_cursor(&newest).await?;
            outcome.cursor = Some(newest);
        }

        Ok(outcome)
    }
}

/// Append the mints from `discovered` that `existing` lacks, keeping the
/// registry's order. Duplicates already present in `existing` are dropped.
/// Returns the merged registry and how many mints were added.
pub fn merge_mints(existing: Vec<MintId>, discovered: Vec<MintId>) -> (Vec<MintId>, usize) {
    let mut seen: HashSet<MintId> = HashSet::with_capacity(existing.len() + discovered.len());
    let mut merged: Vec<MintId> = existing
        .into_iter()
        .filter(|mint| seen.insert(mint.clone()))
        .collect();

    let before = merged.len();
    merged.extend(discovered.into_iter().filter(|mint| seen.insert(mint.clone())));
    let added = merged.len() - before;
    (merged, added)
}

#[async_trait]
impl PollTask for MintDiscovery {
    fn name(&self) -> &'static str {
        "discovery"
    }

    async fn run_iteration(&self) -> TrackerResult<()> {
        let outcome = self.poll_once().await?;
        if outcome.events_scanned > 0 {
            info!(
                "Discovery poll: {} new events over {} pages, {} skipped, {} mints found, {} added",
                outcome.events_scanned,
                outcome.pages_fetched,
                outcome.events_skipped,
                outcome.mints_found,
                outcome.mints_added
            );
        } else {
            debug!("Discovery poll: no new events");
        }
        Ok(())
    }
}
