//! Geographic primitives: validated points, search radii, and haversine
//! distance.
//!
//! All distances are great-circle distances in kilometres on a spherical
//! Earth. Containment is boundary inclusive: a point whose distance equals the
//! radius is inside the search area.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius used for haversine distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default radius for a fresh proximity query (one statute mile).
pub const DEFAULT_RADIUS_KM: f64 = 1.60934;

/// Absorbs floating-point noise so points exactly on the boundary stay inside.
const BOUNDARY_TOLERANCE_KM: f64 = 1e-9;

/// Validation errors raised when constructing a [`GeoPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoPointValidationError {
    /// Latitude was NaN, infinite, or outside `[-90, 90]`.
    #[error("latitude must be a finite value between -90 and 90, got {0}")]
    Latitude(f64),
    /// Longitude was NaN, infinite, or outside `[-180, 180]`.
    #[error("longitude must be a finite value between -180 and 180, got {0}")]
    Longitude(f64),
}

/// WGS84 coordinate pair in decimal degrees.
///
/// ## Invariants
/// - `latitude` is finite and within `[-90, 90]`.
/// - `longitude` is finite and within `[-180, 180]`.
///
/// # Examples
/// ```
/// use cartwatch::domain::GeoPoint;
///
/// let point = GeoPoint::new(51.5072, -0.1276).expect("valid coordinates");
/// assert_eq!(point.latitude(), 51.5072);
/// assert!(GeoPoint::new(91.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(try_from = "GeoPointDto", into = "GeoPointDto")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Validate and construct a point.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoPointValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoPointValidationError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoPointValidationError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in decimal degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in decimal degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Haversine distance to `other` in kilometres.
    ///
    /// # Examples
    /// ```
    /// use cartwatch::domain::GeoPoint;
    ///
    /// let a = GeoPoint::new(0.0, 0.0).expect("valid");
    /// assert_eq!(a.distance_km(&a), 0.0);
    /// ```
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let phi_1 = self.latitude.to_radians();
        let phi_2 = other.latitude.to_radians();
        let delta_phi = (other.latitude - self.latitude).to_radians();
        let delta_lambda = (other.longitude - self.longitude).to_radians();

        let a = (delta_phi / 2.0).sin().powi(2)
            + phi_1.cos() * phi_2.cos() * (delta_lambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();
        EARTH_RADIUS_KM * c
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoPointDto {
    latitude: f64,
    longitude: f64,
}

impl From<GeoPoint> for GeoPointDto {
    fn from(value: GeoPoint) -> Self {
        Self {
            latitude: value.latitude,
            longitude: value.longitude,
        }
    }
}

impl TryFrom<GeoPointDto> for GeoPoint {
    type Error = GeoPointValidationError;

    fn try_from(value: GeoPointDto) -> Result<Self, Self::Error> {
        GeoPoint::new(value.latitude, value.longitude)
    }
}

/// Validation errors raised when constructing a [`RadiusKm`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RadiusValidationError {
    /// Radius was NaN, infinite, zero, or negative.
    #[error("search radius must be a positive finite number of kilometres, got {0}")]
    NotPositive(f64),
}

/// Positive, finite search radius in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct RadiusKm(f64);

impl RadiusKm {
    /// Validate and construct a radius.
    pub fn new(value: f64) -> Result<Self, RadiusValidationError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(RadiusValidationError::NotPositive(value))
        }
    }

    /// Radius value in kilometres.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for RadiusKm {
    fn default() -> Self {
        Self(DEFAULT_RADIUS_KM)
    }
}

impl fmt::Display for RadiusKm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} km", self.0)
    }
}

/// Circle on the Earth's surface used as proximity query criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchArea {
    /// Query centre.
    pub center: GeoPoint,
    /// Query radius.
    pub radius: RadiusKm,
}

impl SearchArea {
    /// Build a search area from a centre and radius.
    pub fn new(center: GeoPoint, radius: RadiusKm) -> Self {
        Self { center, radius }
    }

    /// Return the distance to `point` when it lies inside the area.
    ///
    /// # Examples
    /// ```
    /// use cartwatch::domain::{GeoPoint, RadiusKm, SearchArea};
    ///
    /// let centre = GeoPoint::new(0.0, 0.0).expect("valid");
    /// let area = SearchArea::new(centre, RadiusKm::new(1.0).expect("valid"));
    /// assert_eq!(area.distance_if_within(&centre), Some(0.0));
    /// let far = GeoPoint::new(1.0, 1.0).expect("valid");
    /// assert!(area.distance_if_within(&far).is_none());
    /// ```
    pub fn distance_if_within(&self, point: &GeoPoint) -> Option<f64> {
        let distance = self.center.distance_km(point);
        (distance <= self.radius.get() + BOUNDARY_TOLERANCE_KM).then_some(distance)
    }

    /// Return a copy of this area with a new centre.
    pub fn with_center(self, center: GeoPoint) -> Self {
        Self { center, ..self }
    }

    /// Return a copy of this area with a new radius.
    pub fn with_radius(self, radius: RadiusKm) -> Self {
        Self { radius, ..self }
    }
}
