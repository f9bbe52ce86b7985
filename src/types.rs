//! Core types and data structures for the mint-pulse tracking pipeline.

use serde::{Deserialize, Serialize};
use indexmap::IndexMap;

/// A mint identifier (kept as an opaque string, compared by exact match).
pub type MintId = String;

/// Identifier of the newest feed event already processed. Empty on first run.
pub type Cursor = String;

/// One timestamped holder-count observation for a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
    /// Number of distinct owners observed
    pub holders: u64,
}

impl Snapshot {
    pub fn new(timestamp: u64, holders: u64) -> Self {
        Self { timestamp, holders }
    }
}

/// Per-mint, time-ordered snapshot sequences, keyed in order of first
/// observation. Rank ties and the persisted document both follow that order.
pub type HolderHistory = IndexMap<MintId, Vec<Snapshot>>;

/// Holder growth of one mint inside one window. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRate {
    pub mint: MintId,
    pub rate: u64,
}

/// Ranked rates for a single trailing window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRanking {
    /// Display label, e.g. "1min"
    pub label: String,
    /// Window length in seconds
    pub window_secs: u64,
    /// Mints with a strictly positive rate, highest first
    pub rates: Vec<WindowRate>,
}

/// Ranked rates for every configured window, computed at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateReport {
    /// Evaluation instant, unix milliseconds
    pub computed_at: u64,
    pub windows: Vec<WindowRanking>,
}
