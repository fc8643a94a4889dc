//! Domain primitives, aggregates, and services.
//!
//! Purpose: Define strongly typed domain entities and the services that keep
//! the report store, the spatial index, and subscriber mirrors in step.
//! Adapters reach the outside world only through the traits in [`ports`].
//!
//! Public surface:
//! - Error (alias to `error::Error`): transport-agnostic error payload.
//! - ErrorCode (alias to `error::ErrorCode`): stable error identifier.
//! - GeoPoint / RadiusKm / SearchArea: validated geometry.
//! - Report / ReportRecord / ReportDraft: the report aggregate.
//! - ReportPublisher: validated two-step writes to store and index.
//! - StalenessSweeper: periodic eviction of aged reports.
//! - ProximitySubscription / LocalMirror / LiveMirror: live nearby views.

pub mod error;
pub mod geo;
pub mod local_mirror;
pub mod ports;
pub mod proximity_subscription;
pub mod report;
pub mod report_publisher;
pub mod staleness_sweeper;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::geo::{
    DEFAULT_RADIUS_KM, EARTH_RADIUS_KM, GeoPoint, GeoPointValidationError, RadiusKm,
    RadiusValidationError, SearchArea,
};
pub use self::local_mirror::{LiveMirror, LocalMirror};
pub use self::proximity_subscription::{ProximityEvent, ProximitySubscription};
pub use self::report::{
    AuthorId, DEFAULT_DESCRIPTION, DEFAULT_FOOD_TYPE, DEFAULT_NAME, IdentifierValidationError,
    Report, ReportDraft, ReportId, ReportRecord, ReportValidationError,
};
pub use self::report_publisher::{PublishError, ReportPublisher};
pub use self::staleness_sweeper::{
    DEFAULT_STALENESS, DEFAULT_SWEEP_INTERVAL, StalenessSweeper, StalenessSweeperConfig,
    StalenessSweeperHandle, SweepOutcome, SweepSummary,
};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use cartwatch::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::not_found("report is gone"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
