//! Live geospatial report sync: a spatial index with standing radius
//! queries, a staleness sweeper, a report publisher, and proximity
//! subscriptions feeding local mirrors.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
