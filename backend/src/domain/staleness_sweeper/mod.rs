//! Background eviction of stale reports.
//!
//! Each sweep recomputes `now`, asks the store for records older than the
//! staleness threshold, and evicts them from the store and then the index.
//! Per-record failures are logged and counted without stopping the sweep. A
//! reconciliation pass then removes index keys whose record is gone from the
//! store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use mockable::Clock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::ports::{ReportStore, ReportStoreError, SpatialIndex};
use crate::domain::ReportId;

mod runtime;

pub use runtime::StalenessSweeperHandle;

/// Default delay between sweep cycles (one minute).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default maximum report age (ten minutes).
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(600);

/// Sweeper timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessSweeperConfig {
    /// Delay between sweep cycles.
    pub sweep_interval: Duration,
    /// Maximum record age before eviction.
    pub staleness: Duration,
}

impl Default for StalenessSweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            staleness: DEFAULT_STALENESS,
        }
    }
}

/// Counters describing one completed sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Records the store reported as stale.
    pub candidates: usize,
    /// Candidates removed from both the store and the index.
    pub evicted: usize,
    /// Store deletes that failed.
    pub store_failures: usize,
    /// Index removals that failed.
    pub index_failures: usize,
    /// Index keys removed because their record no longer exists.
    pub dangling_removed: usize,
}

/// Result of a call to [`StalenessSweeper::sweep_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The sweep ran to completion.
    Completed(SweepSummary),
    /// Another sweep was in flight; nothing was touched.
    SkippedInProgress,
}

/// Evicts reports older than the staleness threshold.
pub struct StalenessSweeper {
    store: Arc<dyn ReportStore>,
    index: Arc<dyn SpatialIndex>,
    clock: Arc<dyn Clock>,
    config: StalenessSweeperConfig,
    in_flight: Mutex<()>,
}

impl StalenessSweeper {
    /// Build a sweeper over the given ports.
    pub fn new(
        store: Arc<dyn ReportStore>,
        index: Arc<dyn SpatialIndex>,
        clock: Arc<dyn Clock>,
        config: StalenessSweeperConfig,
    ) -> Self {
        Self {
            store,
            index,
            clock,
            config,
            in_flight: Mutex::new(()),
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> StalenessSweeperConfig {
        self.config
    }

    /// Run a single sweep cycle.
    ///
    /// Returns [`SweepOutcome::SkippedInProgress`] when another sweep holds
    /// the guard. A failure to list candidates abandons the cycle.
    ///
    /// ```rust,ignore
    /// if let SweepOutcome::Completed(summary) = sweeper.sweep_once().await? {
    ///     assert!(summary.evicted <= summary.candidates);
    /// }
    /// ```
    pub async fn sweep_once(&self) -> Result<SweepOutcome, ReportStoreError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("sweep already in progress; skipping");
            return Ok(SweepOutcome::SkippedInProgress);
        };

        let now = self.clock.utc();
        let threshold = TimeDelta::from_std(self.config.staleness).unwrap_or(TimeDelta::MAX);
        let cutoff = now.checked_sub_signed(threshold).unwrap_or(now);

        let candidates = self.store.stale_candidates(cutoff).await.map_err(|error| {
            warn!(error = %error, "listing stale reports failed; abandoning sweep");
            error
        })?;

        let mut summary = SweepSummary {
            candidates: candidates.len(),
            ..SweepSummary::default()
        };
        let mut evicted_ids = BTreeSet::new();

        for (id, record) in candidates {
            if !record.is_stale(now, self.config.staleness) {
                continue;
            }
            if self.evict(&id, &mut summary).await {
                summary.evicted += 1;
            }
            evicted_ids.insert(id);
        }

        self.reconcile_dangling(&evicted_ids, &mut summary).await;

        info!(
            candidates = summary.candidates,
            evicted = summary.evicted,
            store_failures = summary.store_failures,
            index_failures = summary.index_failures,
            dangling_removed = summary.dangling_removed,
            "staleness sweep completed"
        );
        Ok(SweepOutcome::Completed(summary))
    }

    /// Delete `id` from the store, then the index. Returns whether both
    /// succeeded.
    async fn evict(&self, id: &ReportId, summary: &mut SweepSummary) -> bool {
        let mut clean = true;
        if let Err(error) = self.store.delete(id).await {
            warn!(report_id = %id, error = %error, "failed to delete stale report from store");
            summary.store_failures += 1;
            clean = false;
        }
        if let Err(error) = self.index.remove(id).await {
            warn!(report_id = %id, error = %error, "failed to remove stale report from index");
            summary.index_failures += 1;
            clean = false;
        }
        clean
    }

    /// Remove index keys whose store record no longer exists.
    async fn reconcile_dangling(
        &self,
        already_handled: &BTreeSet<ReportId>,
        summary: &mut SweepSummary,
    ) {
        let keys = match self.index.keys().await {
            Ok(keys) => keys,
            Err(error) => {
                warn!(error = %error, "listing index keys failed; skipping reconciliation");
                return;
            }
        };

        for key in keys.into_iter().filter(|key| !already_handled.contains(key)) {
            match self.store.get(&key).await {
                Ok(Some(_)) => {}
                Ok(None) => match self.index.remove(&key).await {
                    Ok(()) => {
                        debug!(report_id = %key, "removed dangling index entry");
                        summary.dangling_removed += 1;
                    }
                    Err(error) => {
                        warn!(
                            report_id = %key,
                            error = %error,
                            "failed to remove dangling index entry"
                        );
                        summary.index_failures += 1;
                    }
                },
                Err(error) => {
                    warn!(
                        report_id = %key,
                        error = %error,
                        "store lookup failed during reconciliation"
                    );
                    summary.store_failures += 1;
                }
            }
        }
    }
}
