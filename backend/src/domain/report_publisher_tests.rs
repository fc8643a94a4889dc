//! Tests for report publishing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{
    MockReportStore, MockSpatialIndex, QueryHandle, ReportStoreError, SpatialIndexError,
};
use crate::domain::{ErrorCode, GeoPoint, ReportValidationError, SearchArea};
use crate::outbound::memory::{InMemoryReportStore, InMemorySpatialIndex};
use crate::test_support::MutableClock;

#[fixture]
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 18, 0, 0)
        .single()
        .expect("valid time")
}

#[fixture]
fn author() -> AuthorId {
    AuthorId::new("uid-42").expect("valid author")
}

#[fixture]
fn draft() -> ReportDraft {
    ReportDraft {
        name: Some("Koi Fusion".to_owned()),
        food_type: Some("taco".to_owned()),
        ..ReportDraft::at(GeoPoint::new(45.52, -122.68).expect("valid point"))
    }
}

fn clock(now: DateTime<Utc>) -> Arc<dyn Clock> {
    Arc::new(MutableClock::new(now))
}

/// Index that fails the first `failures` inserts, then delegates.
struct FlakyIndex {
    inner: InMemorySpatialIndex,
    failures: AtomicUsize,
}

impl FlakyIndex {
    fn failing(times: usize) -> Self {
        Self {
            inner: InMemorySpatialIndex::new(),
            failures: AtomicUsize::new(times),
        }
    }
}

#[async_trait]
impl SpatialIndex for FlakyIndex {
    async fn insert(&self, key: &ReportId, point: GeoPoint) -> Result<(), SpatialIndexError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SpatialIndexError::unavailable("index offline"));
        }
        self.inner.insert(key, point).await
    }

    async fn update_point(
        &self,
        key: &ReportId,
        point: GeoPoint,
    ) -> Result<(), SpatialIndexError> {
        self.inner.update_point(key, point).await
    }

    async fn remove(&self, key: &ReportId) -> Result<(), SpatialIndexError> {
        self.inner.remove(key).await
    }

    async fn query(&self, area: SearchArea) -> Result<QueryHandle, SpatialIndexError> {
        self.inner.query(area).await
    }

    async fn keys(&self) -> Result<Vec<ReportId>, SpatialIndexError> {
        self.inner.keys().await
    }
}

#[rstest]
#[tokio::test]
async fn publish_stores_and_indexes_the_report(
    now: DateTime<Utc>,
    author: AuthorId,
    draft: ReportDraft,
) {
    let store = InMemoryReportStore::new();
    let index = InMemorySpatialIndex::new();
    let publisher = ReportPublisher::new(
        Arc::new(store.clone()),
        Arc::new(index.clone()),
        clock(now),
    );

    let id = publisher
        .publish(draft, &author)
        .await
        .expect("publish succeeds");

    let record = store
        .get(&id)
        .await
        .expect("get succeeds")
        .expect("record stored");
    assert_eq!(record.owner_id, author);
    assert_eq!(record.description, "None");
    assert_eq!(record.timestamp, now);
    assert_eq!(index.keys().await.expect("keys"), vec![id]);
}

#[rstest]
#[tokio::test]
async fn validation_failure_performs_no_writes(now: DateTime<Utc>, author: AuthorId) {
    let mut store = MockReportStore::new();
    store.expect_allocate_id().times(0);
    store.expect_put().times(0);
    let mut index = MockSpatialIndex::new();
    index.expect_insert().times(0);
    let publisher = ReportPublisher::new(Arc::new(store), Arc::new(index), clock(now));

    let draft = ReportDraft {
        longitude: Some(-122.0),
        ..ReportDraft::default()
    };
    let error = publisher
        .publish(draft, &author)
        .await
        .expect_err("missing latitude is rejected");

    assert_eq!(
        error,
        PublishError::Validation(ReportValidationError::MissingLatitude)
    );
    assert_eq!(Error::from(error).code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn store_failure_skips_indexing(now: DateTime<Utc>, author: AuthorId, draft: ReportDraft) {
    let mut store = MockReportStore::new();
    store
        .expect_allocate_id()
        .times(1)
        .returning(|| ReportId::new("r-1").expect("valid id"));
    store
        .expect_put()
        .times(1)
        .returning(|_, _| Err(ReportStoreError::unavailable("connection reset")));
    let mut index = MockSpatialIndex::new();
    index.expect_insert().times(0);
    let publisher = ReportPublisher::new(Arc::new(store), Arc::new(index), clock(now));

    let error = publisher
        .publish(draft, &author)
        .await
        .expect_err("store failure surfaces");

    assert!(matches!(error, PublishError::StoreUnavailable(_)));
    assert_eq!(Error::from(error).code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[tokio::test]
async fn indexing_failure_keeps_record_and_retry_indexes_it(
    now: DateTime<Utc>,
    author: AuthorId,
    draft: ReportDraft,
) {
    let store = InMemoryReportStore::new();
    let index = Arc::new(FlakyIndex::failing(1));
    let publisher = ReportPublisher::new(Arc::new(store.clone()), index.clone(), clock(now));

    let error = publisher
        .publish(draft, &author)
        .await
        .expect_err("index failure surfaces");
    let PublishError::IndexingFailed { id, .. } = error.clone() else {
        panic!("expected IndexingFailed, got {error:?}");
    };

    assert_eq!(store.ids().await, vec![id.clone()]);
    assert!(index.keys().await.expect("keys").is_empty());
    let mapped = Error::from(error);
    assert_eq!(
        mapped
            .details()
            .and_then(|details| details.get("reportId"))
            .and_then(|value| value.as_str()),
        Some(id.as_str())
    );

    publisher
        .retry_indexing(&id)
        .await
        .expect("retry succeeds");
    publisher
        .retry_indexing(&id)
        .await
        .expect("retry is idempotent");

    assert_eq!(store.ids().await, vec![id.clone()]);
    assert_eq!(index.keys().await.expect("keys"), vec![id]);
}

#[rstest]
#[tokio::test]
async fn retry_indexing_unknown_report_is_not_found(now: DateTime<Utc>) {
    let publisher = ReportPublisher::new(
        Arc::new(InMemoryReportStore::new()),
        Arc::new(InMemorySpatialIndex::new()),
        clock(now),
    );
    let id = ReportId::new("ghost").expect("valid id");

    let error = publisher
        .retry_indexing(&id)
        .await
        .expect_err("missing record");

    assert_eq!(error, PublishError::NotFound { id });
    assert_eq!(Error::from(error).code(), ErrorCode::NotFound);
}
