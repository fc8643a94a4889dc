//! In-process report store.
//!
//! Records live in an ordered map behind an async read/write lock. Identifiers
//! are random v4 UUIDs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::ports::{ReportStore, ReportStoreError};
use crate::domain::{ReportId, ReportRecord};

/// Report store adapter holding every record in memory.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct InMemoryReportStore {
    records: Arc<RwLock<BTreeMap<ReportId, ReportRecord>>>,
}

impl InMemoryReportStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Identifiers of every stored record, in key order.
    pub async fn ids(&self) -> Vec<ReportId> {
        self.records.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    fn allocate_id(&self) -> ReportId {
        ReportId::from(Uuid::new_v4())
    }

    async fn put(&self, id: &ReportId, record: &ReportRecord) -> Result<(), ReportStoreError> {
        self.records
            .write()
            .await
            .insert(id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &ReportId) -> Result<Option<ReportRecord>, ReportStoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &ReportId) -> Result<(), ReportStoreError> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn stale_candidates(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<(ReportId, ReportRecord)>, ReportStoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|(_, record)| record.timestamp < older_than)
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use rstest::{fixture, rstest};

    use crate::domain::{AuthorId, GeoPoint, ReportDraft};

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0)
            .single()
            .expect("valid time")
    }

    fn record_at(timestamp: DateTime<Utc>) -> ReportRecord {
        ReportDraft {
            timestamp: Some(timestamp),
            ..ReportDraft::at(GeoPoint::new(40.0, -74.0).expect("valid point"))
        }
        .into_record(AuthorId::new("uid").expect("valid author"), timestamp)
        .expect("valid draft")
    }

    #[rstest]
    fn allocated_ids_are_unique() {
        let store = InMemoryReportStore::new();
        assert_ne!(store.allocate_id(), store.allocate_id());
    }

    #[rstest]
    #[tokio::test]
    async fn put_get_delete_cycle(now: DateTime<Utc>) {
        let store = InMemoryReportStore::new();
        let id = store.allocate_id();
        let record = record_at(now);

        store.put(&id, &record).await.expect("put succeeds");
        assert_eq!(store.get(&id).await.expect("get succeeds"), Some(record));

        store.delete(&id).await.expect("delete succeeds");
        store.delete(&id).await.expect("second delete is a no-op");
        assert_eq!(store.get(&id).await.expect("get succeeds"), None);
        assert!(store.is_empty().await);
    }

    #[rstest]
    #[tokio::test]
    async fn stale_candidates_filters_strictly_older_records(now: DateTime<Utc>) {
        let store = InMemoryReportStore::new();
        let old = ReportId::new("old").expect("valid id");
        let boundary = ReportId::new("boundary").expect("valid id");
        let fresh = ReportId::new("fresh").expect("valid id");
        let cutoff = now - TimeDelta::minutes(10);
        store
            .put(&old, &record_at(cutoff - TimeDelta::seconds(1)))
            .await
            .expect("put old");
        store
            .put(&boundary, &record_at(cutoff))
            .await
            .expect("put boundary");
        store.put(&fresh, &record_at(now)).await.expect("put fresh");

        let candidates = store
            .stale_candidates(cutoff)
            .await
            .expect("scan succeeds");

        let ids: Vec<_> = candidates.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![old]);
    }
}
