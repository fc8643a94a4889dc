//! Test utilities for the backend crate.
//!
//! Shared helpers for unit tests (in `src/`) and integration tests (in
//! `tests/`). Compiled for unit tests and when the `test-support` feature is
//! enabled.

mod doubles;

pub use doubles::{MutableClock, ScriptedQuery};

use crate::domain::{EARTH_RADIUS_KM, GeoPoint};

/// Point `km` kilometres due north of `origin`.
///
/// Travelling along a meridian keeps haversine distances exact up to
/// floating-point rounding, which makes boundary assertions predictable.
///
/// # Panics
/// Panics when the result would pass the North Pole.
pub fn point_north_of(origin: GeoPoint, km: f64) -> GeoPoint {
    let delta_degrees = (km / EARTH_RADIUS_KM).to_degrees();
    match GeoPoint::new(origin.latitude() + delta_degrees, origin.longitude()) {
        Ok(point) => point,
        Err(error) => panic!("offset point out of range: {error}"),
    }
}
