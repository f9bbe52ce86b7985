//! Sliding-window holder growth and per-window ranking.
//!
//! All functions take the evaluation instant explicitly; nothing here reads
//! the wall clock.

use std::time::Duration;

use crate::types::{HolderHistory, RateReport, Snapshot, WindowRanking, WindowRate};

/// Holder growth of one mint over the trailing `window` ending at `now_ms`.
///
/// Uses the oldest and newest snapshots with `timestamp >= now - window`.
/// Fewer than two such snapshots, or a net decrease, yield 0.
pub fn buy_rate(snapshots: &[Snapshot], window: Duration, now_ms: u64) -> u64 {
    let window_start = now_ms.saturating_sub(window.as_millis() as u64);
    let mut in_window = snapshots.iter().filter(|s| s.timestamp >= window_start);

    let oldest = match in_window.next() {
        Some(s) => s,
        None => return 0,
    };
    let newest = match in_window.last() {
        Some(s) => s,
        None => return 0,
    };

    newest.holders.saturating_sub(oldest.holders)
}

/// Rank every mint with positive growth in `window`, highest first.
/// Equal rates keep their encounter order.
pub fn rank_window(history: &HolderHistory, window: Duration, now_ms: u64) -> Vec<WindowRate> {
    let mut rates: Vec<WindowRate> = history
        .iter()
        .filter_map(|(mint, snapshots)| {
            let rate = buy_rate(snapshots, window, now_ms);
            (rate > 0).then(|| WindowRate {
                mint: mint.clone(),
                rate,
            })
        })
        .collect();

    // sort_by is stable
    rates.sort_by(|a, b| b.rate.cmp(&a.rate));
    rates
}

/// Display label for a window: whole minutes as "Nmin", otherwise "Ns".
pub fn window_label(window: Duration) -> String {
    let secs = window.as_secs();
    if secs > 0 && secs % 60 == 0 {
        format!("{}min", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Compute the ranked lists for every window at `now_ms`.
pub fn compute_report(history: &HolderHistory, windows: &[Duration], now_ms: u64) -> RateReport {
    let windows = windows
        .iter()
        .map(|window| WindowRanking {
            label: window_label(*window),
            window_secs: window.as_secs(),
            rates: rank_window(history, *window, now_ms),
        })
        .collect();

    RateReport {
        computed_at: now_ms,
        windows,
    }
}
