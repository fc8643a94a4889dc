//! Domain ports defining the edges of the hexagon.
//!
//! Ports describe how the domain expects to interact with driven adapters
//! (the durable report store and the live spatial index). Each trait exposes
//! strongly typed errors so adapters map their failures into predictable
//! variants instead of returning `anyhow::Result`.

mod macros;
pub(crate) use macros::define_port_error;

mod report_store;
mod spatial_index;

#[cfg(test)]
pub use report_store::MockReportStore;
pub use report_store::{ReportStore, ReportStoreError};
#[cfg(test)]
pub use spatial_index::MockSpatialIndex;
pub use spatial_index::{
    IndexEvent, IndexHit, QueryHandle, QueryId, QueryRegistry, SpatialIndex, SpatialIndexError,
};
