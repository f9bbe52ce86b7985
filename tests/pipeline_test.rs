//! End-to-end test of discovery, collection and ranking over JSON files

mod common;

use common::{transfer_event, ScriptedFeed, ScriptedHolders};
use mint_pulse::tracker::{
    HolderHistoryStore, JsonFileStore, ManualClock, MintRegistryStore, TickOutcome, TrackerParts,
};
use mint_pulse::{Snapshot, TrackerBuilder};
use std::sync::Arc;

const T0: u64 = 1_700_000_000_000;

#[tokio::test]
async fn test_pipeline_discovers_collects_and_ranks() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::in_dir(dir.path()));
    let feed = Arc::new(ScriptedFeed::new(vec![
        transfer_event("e2", &["Hotpump", "So11111111111111111111111111111111111111112"]),
        transfer_event("e1", &["Coldpump"]),
    ]));
    let holders = Arc::new(ScriptedHolders::new());
    holders.set_holders("Hotpump", 4);
    holders.set_holders("Coldpump", 2);
    let clock = Arc::new(ManualClock::new(T0));

    let tracker = TrackerBuilder::new()
        .with_data_dir(dir.path())
        .with_retention(60, 10)
        .with_windows(vec![60, 180])
        .build_with(TrackerParts {
            cursor: store.clone(),
            registry: store.clone(),
            history: store.clone(),
            feed: feed.clone(),
            holders: holders.clone(),
            clock: clock.clone(),
        })
        .unwrap();

    let discovery = tracker.discovery_poller();
    let collector = tracker.collector_poller();

    assert_eq!(discovery.tick().await, TickOutcome::Completed);
    assert_eq!(
        store.load_registry().await.unwrap(),
        vec!["Hotpump".to_string(), "Coldpump".to_string()]
    );

    assert_eq!(collector.tick().await, TickOutcome::Completed);
    clock.advance_secs(30);
    holders.set_holders("Hotpump", 12);
    assert_eq!(collector.tick().await, TickOutcome::Completed);
    clock.advance_secs(40);
    holders.set_holders("Hotpump", 20);
    assert_eq!(collector.tick().await, TickOutcome::Completed);

    // Coldpump stayed below the threshold past the grace period
    assert_eq!(holders.enumerations("Coldpump"), 3);

    let report = tracker.dashboard.report().await.unwrap();
    assert_eq!(report.windows[0].label, "1min");
    let one_minute: Vec<_> = report.windows[0]
        .rates
        .iter()
        .map(|r| (r.mint.as_str(), r.rate))
        .collect();
    assert_eq!(one_minute, vec![("Hotpump", 8)]);
    let three_minutes: Vec<_> = report.windows[1]
        .rates
        .iter()
        .map(|r| (r.mint.as_str(), r.rate))
        .collect();
    assert_eq!(three_minutes, vec![("Hotpump", 16)]);

    clock.advance_secs(10);
    assert_eq!(collector.tick().await, TickOutcome::Completed);
    assert_eq!(holders.enumerations("Coldpump"), 3);
    assert!(std::fs::read_to_string(dir.path().join("inactive_mints.json"))
        .unwrap()
        .contains("Coldpump"));
}

#[tokio::test]
async fn test_failed_discovery_tick_is_reported_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::in_dir(dir.path()));
    let feed = Arc::new(ScriptedFeed::new(vec![transfer_event("e1", &["Apump"])]));
    feed.fail_on_page(Some(1));

    let tracker = TrackerBuilder::new()
        .build_with(TrackerParts {
            cursor: store.clone(),
            registry: store.clone(),
            history: store.clone(),
            feed: feed.clone(),
            holders: Arc::new(ScriptedHolders::new()),
            clock: Arc::new(ManualClock::new(T0)),
        })
        .unwrap();
    let discovery = tracker.discovery_poller();

    assert_eq!(discovery.tick().await, TickOutcome::Failed);
    feed.fail_on_page(None);
    assert_eq!(discovery.tick().await, TickOutcome::Completed);
    assert_eq!(store.load_registry().await.unwrap(), vec!["Apump".to_string()]);
}

#[tokio::test]
async fn test_malformed_history_file_starts_over_from_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("holder_data.json"), "{\"Apump\": [").unwrap();
    let store = Arc::new(JsonFileStore::in_dir(dir.path()));
    store.save_registry(&["Apump".to_string()]).await.unwrap();
    let holders = Arc::new(ScriptedHolders::new());
    holders.set_holders("Apump", 7);

    let tracker = TrackerBuilder::new()
        .build_with(TrackerParts {
            cursor: store.clone(),
            registry: store.clone(),
            history: store.clone(),
            feed: Arc::new(ScriptedFeed::new(Vec::new())),
            holders,
            clock: Arc::new(ManualClock::new(T0)),
        })
        .unwrap();

    // the dashboard cannot compute from a malformed document
    assert!(tracker.dashboard.report().await.is_err());

    let outcome = tracker.collector.collect_once().await.unwrap();
    assert_eq!(outcome.first_observations, 1);
    assert_eq!(
        store.load_history().await.unwrap()["Apump"],
        vec![Snapshot::new(T0, 7)]
    );
}
