//! In-process spatial index with live radius queries.
//!
//! Points live in an ordered map and every standing query keeps the set of
//! keys it currently reports as inside. Each mutation re-evaluates the touched
//! key against every query and pushes the resulting events through the
//! query's unbounded channel while the state lock is held, so all queries
//! observe mutations in the same order.
//!
//! Criteria updates re-evaluate every point against the new area but only
//! emit `Entered` and `Exited`. Members that stay inside produce no event,
//! even though their distance to the centre changed; `Moved` is reserved for
//! points that are themselves relocated.
//!
//! Lookups are linear scans; the contract is what matters here, not the
//! indexing structure.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::ports::{
    IndexEvent, IndexHit, QueryHandle, QueryId, QueryRegistry, SpatialIndex, SpatialIndexError,
};
use crate::domain::{GeoPoint, ReportId, SearchArea};

struct LiveQuery {
    area: SearchArea,
    members: BTreeSet<ReportId>,
    events: mpsc::UnboundedSender<IndexEvent>,
}

impl LiveQuery {
    fn hit(&self, key: &ReportId, point: GeoPoint) -> IndexHit {
        IndexHit {
            key: key.clone(),
            point,
            distance_km: self.area.center.distance_km(&point),
        }
    }

    /// Re-evaluate `key` after it was placed at `point`.
    fn place(&mut self, key: &ReportId, point: GeoPoint, moved: bool) -> Option<IndexEvent> {
        let was_member = self.members.contains(key);
        match (was_member, self.area.distance_if_within(&point)) {
            (false, Some(_)) => {
                self.members.insert(key.clone());
                Some(IndexEvent::Entered(self.hit(key, point)))
            }
            (true, Some(_)) if moved => Some(IndexEvent::Moved(self.hit(key, point))),
            (true, None) => {
                self.members.remove(key);
                Some(IndexEvent::Exited(self.hit(key, point)))
            }
            (true, Some(_)) | (false, None) => None,
        }
    }

    fn evict(&mut self, key: &ReportId, last_point: GeoPoint) -> Option<IndexEvent> {
        self.members
            .remove(key)
            .then(|| IndexEvent::Exited(self.hit(key, last_point)))
    }
}

#[derive(Default)]
struct IndexState {
    points: BTreeMap<ReportId, GeoPoint>,
    queries: HashMap<QueryId, LiveQuery>,
    next_query: QueryId,
}

impl IndexState {
    /// Send `event` to `query`, reporting whether the receiver is still open.
    fn deliver(query: &LiveQuery, event: Option<IndexEvent>) -> bool {
        match event {
            Some(event) => query.events.send(event).is_ok(),
            None => true,
        }
    }

    fn prune(&mut self, abandoned: Vec<QueryId>) {
        for id in abandoned {
            debug!(query_id = id, "pruning spatial query with dropped receiver");
            self.queries.remove(&id);
        }
    }

    fn place(&mut self, key: &ReportId, point: GeoPoint) {
        let previous = self.points.insert(key.clone(), point);
        let moved = previous.is_some_and(|old| old != point);
        let mut abandoned = Vec::new();
        for (id, query) in &mut self.queries {
            let event = query.place(key, point, moved);
            if !Self::deliver(query, event) {
                abandoned.push(*id);
            }
        }
        self.prune(abandoned);
    }

    fn remove(&mut self, key: &ReportId) {
        let Some(last_point) = self.points.remove(key) else {
            return;
        };
        let mut abandoned = Vec::new();
        for (id, query) in &mut self.queries {
            let event = query.evict(key, last_point);
            if !Self::deliver(query, event) {
                abandoned.push(*id);
            }
        }
        self.prune(abandoned);
    }

    fn register(&mut self, area: SearchArea) -> (QueryId, mpsc::UnboundedReceiver<IndexEvent>) {
        let id = self.next_query;
        self.next_query = self.next_query.wrapping_add(1);
        let (events, receiver) = mpsc::unbounded_channel();
        let mut query = LiveQuery {
            area,
            members: BTreeSet::new(),
            events,
        };
        for (key, point) in &self.points {
            let event = query.place(key, *point, false);
            Self::deliver(&query, event);
        }
        self.queries.insert(id, query);
        (id, receiver)
    }

    fn recriteria(&mut self, id: QueryId, area: SearchArea) -> Result<(), SpatialIndexError> {
        let Some(query) = self.queries.get_mut(&id) else {
            return Err(SpatialIndexError::query_closed(id));
        };
        query.area = area;
        let mut open = true;
        for (key, point) in &self.points {
            let event = query.place(key, *point, false);
            open &= Self::deliver(query, event);
        }
        if !open {
            self.prune(vec![id]);
        }
        Ok(())
    }
}

struct SharedIndex {
    state: Mutex<IndexState>,
}

impl SharedIndex {
    fn lock(&self) -> Result<MutexGuard<'_, IndexState>, SpatialIndexError> {
        self.state
            .lock()
            .map_err(|_| SpatialIndexError::unavailable("spatial index state poisoned"))
    }
}

#[async_trait]
impl QueryRegistry for SharedIndex {
    async fn update_criteria(
        &self,
        query: QueryId,
        area: SearchArea,
    ) -> Result<(), SpatialIndexError> {
        self.lock()?.recriteria(query, area)
    }

    fn release(&self, query: QueryId) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.queries.remove(&query);
    }
}

/// Spatial index adapter holding all points in process memory.
///
/// Cloning shares the underlying index.
///
/// # Examples
/// ```
/// use cartwatch::domain::ports::{IndexEvent, SpatialIndex};
/// use cartwatch::domain::{GeoPoint, RadiusKm, ReportId, SearchArea};
/// use cartwatch::outbound::memory::InMemorySpatialIndex;
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let index = InMemorySpatialIndex::new();
/// let here = GeoPoint::new(45.52, -122.68).expect("valid point");
/// let key = ReportId::new("cart-1").expect("valid id");
/// index.insert(&key, here).await.expect("insert succeeds");
///
/// let mut handle = index
///     .query(SearchArea::new(here, RadiusKm::default()))
///     .await
///     .expect("query opens");
/// let event = handle.next_event().await.expect("replayed entry");
/// assert!(matches!(event, IndexEvent::Entered(hit) if hit.key == key));
/// # });
/// ```
#[derive(Clone)]
pub struct InMemorySpatialIndex {
    shared: Arc<SharedIndex>,
}

impl InMemorySpatialIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedIndex {
                state: Mutex::new(IndexState::default()),
            }),
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.shared.lock().map(|state| state.points.len()).unwrap_or(0)
    }

    /// Whether the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of standing queries still registered.
    pub fn open_query_count(&self) -> usize {
        self.shared
            .lock()
            .map(|state| state.queries.len())
            .unwrap_or(0)
    }
}

impl Default for InMemorySpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpatialIndex for InMemorySpatialIndex {
    async fn insert(&self, key: &ReportId, point: GeoPoint) -> Result<(), SpatialIndexError> {
        self.shared.lock()?.place(key, point);
        Ok(())
    }

    async fn update_point(
        &self,
        key: &ReportId,
        point: GeoPoint,
    ) -> Result<(), SpatialIndexError> {
        self.shared.lock()?.place(key, point);
        Ok(())
    }

    async fn remove(&self, key: &ReportId) -> Result<(), SpatialIndexError> {
        self.shared.lock()?.remove(key);
        Ok(())
    }

    async fn query(&self, area: SearchArea) -> Result<QueryHandle, SpatialIndexError> {
        let (id, receiver) = self.shared.lock()?.register(area);
        let registry: Arc<dyn QueryRegistry> = self.shared.clone();
        Ok(QueryHandle::new(id, area, receiver, registry))
    }

    async fn keys(&self) -> Result<Vec<ReportId>, SpatialIndexError> {
        Ok(self.shared.lock()?.points.keys().cloned().collect())
    }
}

#[cfg(test)]
#[path = "spatial_index_tests.rs"]
mod tests;
