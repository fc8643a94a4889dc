//! Shared test doubles: a settable clock and a hand-driven query handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use tokio::sync::mpsc;

use crate::domain::SearchArea;
use crate::domain::ports::{IndexEvent, QueryHandle, QueryId, QueryRegistry, SpatialIndexError};

/// Clock whose current time only changes when a test advances it.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward by `delta`.
    ///
    /// # Panics
    /// Panics when `delta` does not fit a chrono `TimeDelta`.
    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}",)
            }
        };
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

#[derive(Default)]
struct ScriptedRegistry {
    updates: Mutex<Vec<SearchArea>>,
    released: AtomicBool,
}

#[async_trait]
impl QueryRegistry for ScriptedRegistry {
    async fn update_criteria(
        &self,
        _query: QueryId,
        area: SearchArea,
    ) -> Result<(), SpatialIndexError> {
        match self.updates.lock() {
            Ok(mut updates) => updates.push(area),
            Err(_) => panic!("updates mutex"),
        }
        Ok(())
    }

    fn release(&self, _query: QueryId) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Test-side controller of a [`QueryHandle`] whose events are pushed by hand.
pub struct ScriptedQuery {
    events: mpsc::UnboundedSender<IndexEvent>,
    registry: Arc<ScriptedRegistry>,
}

impl ScriptedQuery {
    /// Create a controller and the handle it drives.
    pub fn open(area: SearchArea) -> (Self, QueryHandle) {
        let (events, receiver) = mpsc::unbounded_channel();
        let registry = Arc::new(ScriptedRegistry::default());
        let handle = QueryHandle::new(0, area, receiver, registry.clone());
        (Self { events, registry }, handle)
    }

    /// Push an index event; returns `false` once the handle is closed.
    pub fn emit(&self, event: IndexEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Criteria updates received so far.
    ///
    /// # Panics
    /// Panics when the updates mutex is poisoned.
    pub fn updates(&self) -> Vec<SearchArea> {
        match self.registry.updates.lock() {
            Ok(updates) => updates.clone(),
            Err(_) => panic!("updates mutex"),
        }
    }

    /// Whether the handle has been released.
    pub fn is_released(&self) -> bool {
        self.registry.released.load(Ordering::SeqCst)
    }
}
