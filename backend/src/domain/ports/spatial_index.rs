//! Driven port for the live spatial index.
//!
//! The index maps report identifiers to points and serves standing radius
//! queries. A query is represented by a [`QueryHandle`]: it first replays an
//! `Entered` event for every point already inside the circle, then streams
//! membership changes as points are inserted, moved, or removed, and as the
//! query criteria change via [`QueryHandle::update_criteria`].
//!
//! Containment is boundary inclusive and distances are haversine kilometres
//! (see [`SearchArea::distance_if_within`]).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::define_port_error;
use crate::domain::{GeoPoint, ReportId, SearchArea};

define_port_error! {
    /// Errors raised by spatial index adapters.
    pub enum SpatialIndexError {
        /// Backend could not be reached or refused the operation.
        Unavailable { message: String } =>
            "spatial index unavailable: {message}",
        /// The query handle was already closed.
        QueryClosed { query: u64 } =>
            "spatial index query {query} is closed",
    }
}

/// Identifier of a standing query inside one index instance.
pub type QueryId = u64;

/// Point membership payload carried by every [`IndexEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// Indexed key.
    pub key: ReportId,
    /// Location of the key when the event was produced.
    pub point: GeoPoint,
    /// Distance from the query centre in kilometres.
    pub distance_km: f64,
}

/// Membership change emitted by a standing query.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    /// Key is now inside the query circle.
    Entered(IndexHit),
    /// Key left the circle (or was removed from the index).
    Exited(IndexHit),
    /// Key moved while staying inside the circle.
    Moved(IndexHit),
}

impl IndexEvent {
    /// Payload shared by all variants.
    pub fn hit(&self) -> &IndexHit {
        match self {
            Self::Entered(hit) | Self::Exited(hit) | Self::Moved(hit) => hit,
        }
    }

    /// Key the event refers to.
    pub fn key(&self) -> &ReportId {
        &self.hit().key
    }
}

/// Registry side of a standing query, implemented by index adapters.
#[async_trait]
pub trait QueryRegistry: Send + Sync {
    /// Replace the criteria of `query` and emit the resulting membership
    /// changes on its event channel.
    async fn update_criteria(&self, query: QueryId, area: SearchArea)
    -> Result<(), SpatialIndexError>;

    /// Drop every registration held for `query`. Must be idempotent.
    fn release(&self, query: QueryId);
}

/// Long-lived subscription to a radius query.
///
/// Dropping the handle closes it.
pub struct QueryHandle {
    id: QueryId,
    criteria: SearchArea,
    events: mpsc::UnboundedReceiver<IndexEvent>,
    registry: Arc<dyn QueryRegistry>,
    closed: bool,
}

impl QueryHandle {
    /// Assemble a handle from an adapter's registration.
    pub fn new(
        id: QueryId,
        criteria: SearchArea,
        events: mpsc::UnboundedReceiver<IndexEvent>,
        registry: Arc<dyn QueryRegistry>,
    ) -> Self {
        Self {
            id,
            criteria,
            events,
            registry,
            closed: false,
        }
    }

    /// Identifier of the query inside its index.
    pub fn id(&self) -> QueryId {
        self.id
    }

    /// Criteria most recently accepted by the index.
    pub fn criteria(&self) -> SearchArea {
        self.criteria
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for the next membership change.
    ///
    /// Returns `None` once the handle is closed or the index dropped the
    /// query. Cancellation safe.
    pub async fn next_event(&mut self) -> Option<IndexEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    /// Move and/or resize the query circle.
    pub async fn update_criteria(&mut self, area: SearchArea) -> Result<(), SpatialIndexError> {
        if self.closed {
            return Err(SpatialIndexError::query_closed(self.id));
        }
        self.registry.update_criteria(self.id, area).await?;
        self.criteria = area;
        Ok(())
    }

    /// Release the query. Buffered events are discarded. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.registry.release(self.id);
        self.events.close();
        while self.events.try_recv().is_ok() {}
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandle")
            .field("id", &self.id)
            .field("criteria", &self.criteria)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Port for maintaining point registrations and serving radius queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpatialIndex: Send + Sync {
    /// Register `key` at `point`. Registering an existing key moves it.
    async fn insert(&self, key: &ReportId, point: GeoPoint) -> Result<(), SpatialIndexError>;

    /// Move an existing key to `point`; behaves as `insert` for unknown keys.
    async fn update_point(&self, key: &ReportId, point: GeoPoint)
    -> Result<(), SpatialIndexError>;

    /// Remove `key`. Removing an unknown key succeeds.
    async fn remove(&self, key: &ReportId) -> Result<(), SpatialIndexError>;

    /// Open a standing query for `area`.
    async fn query(&self, area: SearchArea) -> Result<QueryHandle, SpatialIndexError>;

    /// Every key currently registered.
    async fn keys(&self) -> Result<Vec<ReportId>, SpatialIndexError>;
}
