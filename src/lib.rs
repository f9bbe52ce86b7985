//! mint-pulse - holder growth tracking for newly launched token mints
//!
//! This crate discovers mint identifiers from a webhook event feed, records
//! per-mint holder-count snapshots from a token-accounts RPC, and ranks mints
//! by how quickly they gain holders over short trailing windows.

pub mod config;
pub mod error;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
pub use tracker::{Tracker, TrackerBuilder};
pub use types::{HolderHistory, MintId, RateReport, Snapshot, WindowRate};
