//! Proximity subscription: a standing radius query turned into hydrated
//! report events.
//!
//! A background task owns the [`QueryHandle`]. Index events are hydrated from
//! the report store concurrently, but results are queued in arrival order so
//! a later event for a key is never emitted ahead of an earlier one. Hydration
//! misses are a normal outcome: an `entered` key without a record is dropped,
//! and a `moved` key without a record degrades to an exit.
//!
//! At most [`MAX_IN_FLIGHT_HYDRATIONS`] store lookups run at once; further
//! index events wait in the query's channel until a slot frees up.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesOrdered;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::ports::{
    IndexEvent, QueryHandle, QueryId, ReportStore, SpatialIndex, SpatialIndexError,
};
use crate::domain::{GeoPoint, RadiusKm, Report, ReportId, SearchArea};

/// Hydrated membership change delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityEvent {
    /// Report came into range.
    ReportEntered(Report),
    /// Report left range or no longer exists.
    ReportExited(ReportId),
    /// Report moved while staying in range.
    ReportMoved(Report),
}

impl ProximityEvent {
    /// Identifier of the report the event refers to.
    pub fn report_id(&self) -> &ReportId {
        match self {
            Self::ReportEntered(report) | Self::ReportMoved(report) => &report.id,
            Self::ReportExited(id) => id,
        }
    }
}

/// Upper bound on concurrent store lookups per subscription.
pub const MAX_IN_FLIGHT_HYDRATIONS: usize = 16;

enum Command {
    UpdateCriteria {
        area: SearchArea,
        reply: oneshot::Sender<Result<(), SpatialIndexError>>,
    },
}

/// Live stream of report events for a moving search area.
///
/// Dropping the subscription closes it.
pub struct ProximitySubscription {
    query_id: QueryId,
    criteria: SearchArea,
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<ProximityEvent>,
    task: JoinHandle<()>,
    closed: bool,
}

impl ProximitySubscription {
    /// Open a standing query for `area` and start hydrating its events.
    ///
    /// ```rust,ignore
    /// let mut subscription = ProximitySubscription::open(&*index, store, area).await?;
    /// while let Some(event) = subscription.next_event().await {
    ///     mirror.apply(event);
    /// }
    /// ```
    pub async fn open(
        index: &dyn SpatialIndex,
        store: Arc<dyn ReportStore>,
        area: SearchArea,
    ) -> Result<Self, SpatialIndexError> {
        let handle = index.query(area).await?;
        Ok(Self::from_handle(handle, store))
    }

    /// Wrap an already open query handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_handle(handle: QueryHandle, store: Arc<dyn ReportStore>) -> Self {
        let query_id = handle.id();
        let criteria = handle.criteria();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(handle, store, command_rx, event_tx));
        debug!(
            query_id,
            center = %criteria.center,
            radius = %criteria.radius,
            "proximity subscription opened"
        );
        Self {
            query_id,
            criteria,
            commands,
            events,
            task,
            closed: false,
        }
    }

    /// Identifier of the underlying index query.
    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    /// Current query criteria.
    pub fn criteria(&self) -> SearchArea {
        self.criteria
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for the next hydrated event.
    ///
    /// Returns `None` once the subscription is closed or the underlying
    /// query ended. Cancellation safe.
    pub async fn next_event(&mut self) -> Option<ProximityEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    /// Move the query centre, keeping the radius.
    pub async fn update_center(&mut self, center: GeoPoint) -> Result<(), SpatialIndexError> {
        self.update_criteria(self.criteria.with_center(center)).await
    }

    /// Resize the query, keeping the centre.
    pub async fn update_radius(&mut self, radius: RadiusKm) -> Result<(), SpatialIndexError> {
        self.update_criteria(self.criteria.with_radius(radius)).await
    }

    async fn update_criteria(&mut self, area: SearchArea) -> Result<(), SpatialIndexError> {
        let query_id = self.query_id;
        let closed = move || SpatialIndexError::query_closed(query_id);
        if self.closed {
            return Err(closed());
        }
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::UpdateCriteria { area, reply })
            .map_err(|_| closed())?;
        response.await.map_err(|_| closed())??;
        self.criteria = area;
        Ok(())
    }

    /// Release the query. Events still in flight are discarded. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.task.abort();
        self.events.close();
        while self.events.try_recv().is_ok() {}
        debug!(query_id = self.query_id, "proximity subscription closed");
    }
}

impl Drop for ProximitySubscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ProximitySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProximitySubscription")
            .field("query_id", &self.query_id)
            .field("criteria", &self.criteria)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

async fn drive(
    mut handle: QueryHandle,
    store: Arc<dyn ReportStore>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ProximityEvent>,
) {
    let mut pending = FuturesOrdered::new();
    let mut index_open = true;

    loop {
        let has_slot = pending.len() < MAX_IN_FLIGHT_HYDRATIONS;
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::UpdateCriteria { area, reply }) => {
                    let result = handle.update_criteria(area).await;
                    let _ = reply.send(result);
                }
                None => break,
            },
            event = handle.next_event(), if index_open && has_slot => match event {
                Some(event) => pending.push_back(hydrate(store.clone(), event)),
                None => index_open = false,
            },
            Some(hydrated) = pending.next(), if !pending.is_empty() => {
                if let Some(hydrated) = hydrated {
                    if events.send(hydrated).is_err() {
                        break;
                    }
                }
            }
        }

        if !index_open && pending.is_empty() {
            break;
        }
    }

    handle.close();
}

async fn hydrate(store: Arc<dyn ReportStore>, event: IndexEvent) -> Option<ProximityEvent> {
    match event {
        IndexEvent::Entered(hit) => match store.get(&hit.key).await {
            Ok(Some(record)) => Some(ProximityEvent::ReportEntered(Report::new(hit.key, record))),
            Ok(None) => {
                debug!(report_id = %hit.key, "dropping entered event for missing report");
                None
            }
            Err(error) => {
                warn!(report_id = %hit.key, error = %error, "hydrating entered report failed");
                None
            }
        },
        IndexEvent::Exited(hit) => Some(ProximityEvent::ReportExited(hit.key)),
        IndexEvent::Moved(hit) => match store.get(&hit.key).await {
            Ok(Some(record)) => Some(ProximityEvent::ReportMoved(Report::new(hit.key, record))),
            Ok(None) => {
                debug!(report_id = %hit.key, "moved report is gone; treating as exit");
                Some(ProximityEvent::ReportExited(hit.key))
            }
            Err(error) => {
                warn!(
                    report_id = %hit.key,
                    error = %error,
                    "hydrating moved report failed; treating as exit"
                );
                Some(ProximityEvent::ReportExited(hit.key))
            }
        },
    }
}

#[cfg(test)]
#[path = "proximity_subscription_tests.rs"]
mod tests;
