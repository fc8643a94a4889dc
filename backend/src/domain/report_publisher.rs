//! Report publishing service.
//!
//! Publishing is a two-step write: the record goes to the durable store first,
//! then its location is registered with the spatial index. A failed store
//! write leaves no trace. A failed index write leaves a stored but
//! undiscoverable report, surfaced as [`PublishError::IndexingFailed`] so the
//! caller can retry the index step alone with [`ReportPublisher::retry_indexing`].

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::ports::{ReportStore, ReportStoreError, SpatialIndex, SpatialIndexError};
use crate::domain::{AuthorId, Error, ReportDraft, ReportId, ReportValidationError};

/// Failures returned by [`ReportPublisher`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PublishError {
    /// The draft was rejected before any write.
    #[error("invalid report: {0}")]
    Validation(#[from] ReportValidationError),
    /// The durable store rejected the operation.
    #[error(transparent)]
    StoreUnavailable(#[from] ReportStoreError),
    /// The record was stored under `id` but could not be indexed.
    #[error("report {id} was stored but indexing failed: {source}")]
    IndexingFailed {
        /// Identifier already issued for the stored record.
        id: ReportId,
        /// Underlying index failure.
        #[source]
        source: SpatialIndexError,
    },
    /// No stored record exists for the id being re-indexed.
    #[error("report {id} not found")]
    NotFound {
        /// Identifier that was looked up.
        id: ReportId,
    },
}

impl From<PublishError> for Error {
    fn from(value: PublishError) -> Self {
        match &value {
            PublishError::Validation(_) => Error::invalid_request(value.to_string()),
            PublishError::StoreUnavailable(_) => Error::service_unavailable(value.to_string()),
            PublishError::IndexingFailed { id, .. } => Error::service_unavailable(
                "report stored but not yet discoverable; retry indexing",
            )
            .with_details(json!({ "reportId": id.as_str() })),
            PublishError::NotFound { .. } => Error::not_found(value.to_string()),
        }
    }
}

/// Validates drafts and writes them to the store and index.
#[derive(Clone)]
pub struct ReportPublisher {
    store: Arc<dyn ReportStore>,
    index: Arc<dyn SpatialIndex>,
    clock: Arc<dyn Clock>,
}

impl ReportPublisher {
    /// Create a publisher over the given ports.
    pub fn new(
        store: Arc<dyn ReportStore>,
        index: Arc<dyn SpatialIndex>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            index,
            clock,
        }
    }

    /// Validate `draft`, store it, and index its location.
    ///
    /// ```rust,ignore
    /// let id = publisher.publish(draft, &author).await?;
    /// ```
    pub async fn publish(
        &self,
        draft: ReportDraft,
        author: &AuthorId,
    ) -> Result<ReportId, PublishError> {
        let record = draft.into_record(author.clone(), self.clock.utc())?;
        let id = self.store.allocate_id();

        self.store.put(&id, &record).await.map_err(|error| {
            warn!(report_id = %id, error = %error, "report store write failed");
            PublishError::StoreUnavailable(error)
        })?;

        self.index
            .insert(&id, record.location)
            .await
            .map_err(|source| {
                warn!(report_id = %id, error = %source, "report stored but indexing failed");
                PublishError::IndexingFailed {
                    id: id.clone(),
                    source,
                }
            })?;

        info!(report_id = %id, author = %author, location = %record.location, "report published");
        Ok(id)
    }

    /// Re-run only the index step for an already stored report.
    ///
    /// Idempotent: indexing a key that is already registered at the same
    /// point emits no events.
    pub async fn retry_indexing(&self, id: &ReportId) -> Result<(), PublishError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| PublishError::NotFound { id: id.clone() })?;

        self.index
            .insert(id, record.location)
            .await
            .map_err(|source| PublishError::IndexingFailed {
                id: id.clone(),
                source,
            })?;

        info!(report_id = %id, "report indexing retried");
        Ok(())
    }
}

#[cfg(test)]
#[path = "report_publisher_tests.rs"]
mod tests;
