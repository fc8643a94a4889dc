//! Periodic driver for the staleness sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{info, warn};

use super::StalenessSweeper;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configured interval clamped to what the tick timer can schedule.
pub(super) fn sweep_period(configured: Duration) -> Duration {
    configured.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

/// Owner of a spawned sweep loop.
pub struct StalenessSweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl StalenessSweeperHandle {
    /// Signal the loop to stop and wait for it to exit.
    ///
    /// An in-flight sweep finishes before the loop observes the signal.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            warn!(error = %error, "staleness sweeper task ended abnormally");
        }
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl StalenessSweeper {
    /// Sweep every configured interval until `shutdown` flips to `true` or
    /// its sender is dropped.
    ///
    /// The first sweep runs one interval after start. Each sweep is awaited
    /// before the next tick; ticks missed meanwhile are skipped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = sweep_period(self.config.sweep_interval);
        if period != self.config.sweep_interval {
            warn!(
                configured_ms = self.config.sweep_interval.as_millis(),
                interval_ms = period.as_millis(),
                "sweep interval out of range; clamped"
            );
        }
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = period.as_millis(), "staleness sweeper started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticks.tick() => {
                    // Listing failures are logged inside the sweep; the next
                    // tick retries.
                    let _ = self.sweep_once().await;
                }
            }
        }

        info!("staleness sweeper stopped");
    }

    /// Spawn [`Self::run`] on the current tokio runtime.
    pub fn spawn(self: Arc<Self>) -> StalenessSweeperHandle {
        let (shutdown, receiver) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(receiver).await });
        StalenessSweeperHandle { shutdown, task }
    }
}
