//! Scripted upstreams shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mint_pulse::tracker::{EventFeed, FeedEvent, HolderSource};
use mint_pulse::{TrackerError, TrackerResult};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Build a feed event whose payload transfers the given mints.
pub fn transfer_event(id: &str, mints: &[&str]) -> FeedEvent {
    let transfers: Vec<_> = mints.iter().map(|m| json!({ "mint": m, "tokenAmount": 1 })).collect();
    FeedEvent::new(id, json!([{ "signature": format!("sig-{}", id), "tokenTransfers": transfers }]).to_string())
}

/// Newest-first event log served in pages of the requested size.
#[derive(Default)]
pub struct ScriptedFeed {
    events: Mutex<Vec<FeedEvent>>,
    failing_page: Mutex<Option<u32>>,
    pages_served: Mutex<Vec<u32>>,
}

impl ScriptedFeed {
    pub fn new(events: Vec<FeedEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Self::default()
        }
    }

    /// Prepend newer events.
    pub fn push_newest(&self, mut newer: Vec<FeedEvent>) {
        let mut events = self.events.lock().unwrap();
        newer.extend(events.drain(..));
        *events = newer;
    }

    pub fn fail_on_page(&self, page: Option<u32>) {
        *self.failing_page.lock().unwrap() = page;
    }

    pub fn pages_served(&self) -> Vec<u32> {
        self.pages_served.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventFeed for ScriptedFeed {
    async fn fetch_page(&self, page: u32, limit: u32) -> TrackerResult<Vec<FeedEvent>> {
        if *self.failing_page.lock().unwrap() == Some(page) {
            return Err(TrackerError::Rpc(format!("feed page {} unavailable", page)));
        }
        self.pages_served.lock().unwrap().push(page);

        let events = self.events.lock().unwrap();
        let start = ((page - 1) * limit) as usize;
        let end = (start + limit as usize).min(events.len());
        if start >= events.len() {
            return Ok(Vec::new());
        }
        Ok(events[start..end].to_vec())
    }
}

/// Token-account owners per mint, served in pages.
#[derive(Default)]
pub struct ScriptedHolders {
    owners: Mutex<HashMap<String, Vec<String>>>,
    failing: Mutex<HashSet<String>>,
    enumerations: Mutex<HashMap<String, usize>>,
}

impl ScriptedHolders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `mint` exactly `count` distinct owners.
    pub fn set_holders(&self, mint: &str, count: usize) {
        let owners = (0..count).map(|i| format!("owner-{}", i)).collect();
        self.set_owners(mint, owners);
    }

    /// Set the raw owner list of every token account of `mint`.
    pub fn set_owners(&self, mint: &str, owners: Vec<String>) {
        self.owners.lock().unwrap().insert(mint.to_string(), owners);
    }

    pub fn set_failing(&self, mint: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(mint.to_string());
        } else {
            set.remove(mint);
        }
    }

    /// How many times the enumeration of `mint` was started.
    pub fn enumerations(&self, mint: &str) -> usize {
        self.enumerations.lock().unwrap().get(mint).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HolderSource for ScriptedHolders {
    async fn fetch_owners_page(&self, mint: &str, page: u32, limit: u32) -> TrackerResult<Vec<String>> {
        if page == 1 {
            *self.enumerations.lock().unwrap().entry(mint.to_string()).or_default() += 1;
        }
        if self.failing.lock().unwrap().contains(mint) {
            return Err(TrackerError::Rpc(format!("getTokenAccounts failed for {}", mint)));
        }

        let owners = self.owners.lock().unwrap();
        let all = owners.get(mint).cloned().unwrap_or_default();
        let start = ((page - 1) * limit) as usize;
        if start >= all.len() {
            return Ok(Vec::new());
        }
        let end = (start + limit as usize).min(all.len());
        Ok(all[start..end].to_vec())
    }
}
