//! In-process adapters for the report store and spatial index ports.
//!
//! The default binary runs on these, and integration tests use them as
//! faithful fakes of the durable collaborators.

mod report_store;
mod spatial_index;

pub use report_store::InMemoryReportStore;
pub use spatial_index::InMemorySpatialIndex;
