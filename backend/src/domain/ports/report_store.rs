//! Driven port for the durable report directory.
//!
//! The store is an opaque key-value collaborator. It allocates identifiers
//! for new reports and answers point lookups; the staleness sweeper relies on
//! [`ReportStore::stale_candidates`], which adapters may implement as a full
//! scan plus filter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;
use crate::domain::{ReportId, ReportRecord};

define_port_error! {
    /// Errors raised by report store adapters.
    pub enum ReportStoreError {
        /// Backend could not be reached or refused the operation.
        Unavailable { message: String } =>
            "report store unavailable: {message}",
        /// Operation reached the backend but failed.
        Query { message: String } =>
            "report store query failed: {message}",
    }
}

/// Port for reading and writing report records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Allocate a fresh, unique identifier for a new record.
    fn allocate_id(&self) -> ReportId;

    /// Write `record` under `id`, replacing any previous record.
    async fn put(&self, id: &ReportId, record: &ReportRecord) -> Result<(), ReportStoreError>;

    /// Fetch the record stored under `id`; `Ok(None)` when absent.
    async fn get(&self, id: &ReportId) -> Result<Option<ReportRecord>, ReportStoreError>;

    /// Delete the record stored under `id`. Deleting an absent id succeeds.
    async fn delete(&self, id: &ReportId) -> Result<(), ReportStoreError>;

    /// Return every record whose timestamp is strictly before `older_than`.
    async fn stale_candidates(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<(ReportId, ReportRecord)>, ReportStoreError>;
}
