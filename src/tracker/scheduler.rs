//! Fixed-interval polling loops.
//!
//! Each pipeline stage exposes a single-iteration entry point (`PollTask`).
//! `Poller` drives it on a timer; tests call the iteration directly.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::error::TrackerResult;

/// One iteration of a polling component.
#[async_trait]
pub trait PollTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_iteration(&self) -> TrackerResult<()>;
}

/// What happened on one scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    Failed,
    /// A previous iteration of the same task was still in progress
    AlreadyRunning,
}

/// Runs a `PollTask` every `interval`, never overlapping two iterations.
pub struct Poller {
    task: Arc<dyn PollTask>,
    interval: Duration,
    running: Mutex<()>,
}

impl Poller {
    pub fn new(task: Arc<dyn PollTask>, interval: Duration) -> Self {
        Self {
            task,
            interval,
            running: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.task.name()
    }

    /// Run one iteration unless one is already in progress. Errors are
    /// logged and reported, never propagated.
    pub async fn tick(&self) -> TickOutcome {
        let _guard = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("{} iteration still running, skipping this trigger", self.name());
                return TickOutcome::AlreadyRunning;
            }
        };

        match self.task.run_iteration().await {
            Ok(()) => TickOutcome::Completed,
            Err(e) => {
                error!("{} iteration failed: {}", self.name(), e);
                TickOutcome::Failed
            }
        }
    }

    /// Main execution loop. The first iteration starts immediately; a slow
    /// iteration delays the next one instead of causing a burst.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("{} loop is running, every {}s", self.name(), self.interval.as_secs());

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("{} loop shutting down", self.name());
                        break;
                    }
                }
            }
        }
    }
}
