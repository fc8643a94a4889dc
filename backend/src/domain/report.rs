//! Report aggregate: a food cart sighting with a location and a food type.
//!
//! Reports are immutable once written. A [`ReportDraft`] carries the optional
//! caller-supplied fields; [`ReportDraft::into_record`] validates coordinates
//! and fills display defaults to produce the stored [`ReportRecord`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::geo::{GeoPoint, GeoPointValidationError};

/// Display name used when a draft omits `name`.
pub const DEFAULT_NAME: &str = "Unknown";
/// Description used when a draft omits `description`.
pub const DEFAULT_DESCRIPTION: &str = "None";
/// Food type used when a draft omits `foodType`.
pub const DEFAULT_FOOD_TYPE: &str = "other";

/// Validation errors for identifier newtypes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierValidationError {
    /// Identifier is empty after trimming whitespace.
    #[error("{kind} must not be empty")]
    Empty {
        /// Which identifier failed validation.
        kind: &'static str,
    },
    /// Identifier contains leading or trailing whitespace.
    #[error("{kind} must not contain surrounding whitespace")]
    ContainsWhitespace {
        /// Which identifier failed validation.
        kind: &'static str,
    },
}

fn validate_identifier(raw: &str, kind: &'static str) -> Result<(), IdentifierValidationError> {
    if raw.trim().is_empty() {
        return Err(IdentifierValidationError::Empty { kind });
    }
    if raw.trim() != raw {
        return Err(IdentifierValidationError::ContainsWhitespace { kind });
    }
    Ok(())
}

/// Opaque report identifier allocated by the report store.
///
/// # Examples
/// ```
/// use cartwatch::domain::ReportId;
///
/// let id = ReportId::new("-Kc9x2").expect("valid id");
/// assert_eq!(id.as_str(), "-Kc9x2");
/// assert!(ReportId::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    /// Validate and wrap a raw identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierValidationError> {
        let raw = value.into();
        validate_identifier(&raw, "report id")?;
        Ok(Self(raw))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Uuid> for ReportId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for ReportId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Identifier of the authenticated user publishing a report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AuthorId(String);

impl AuthorId {
    /// Validate and wrap a raw author identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierValidationError> {
        let raw = value.into();
        validate_identifier(&raw, "author id")?;
        Ok(Self(raw))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while turning a [`ReportDraft`] into a [`ReportRecord`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportValidationError {
    /// The draft carried no latitude.
    #[error("latitude is required")]
    MissingLatitude,
    /// The draft carried no longitude.
    #[error("longitude is required")]
    MissingLongitude,
    /// Coordinates were present but out of range.
    #[error(transparent)]
    InvalidLocation(#[from] GeoPointValidationError),
}

/// Caller-supplied report fields prior to validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    /// Display name of the cart.
    pub name: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Food type tag (for example `taco` or `coffee`).
    #[serde(alias = "foodtype")]
    pub food_type: Option<String>,
    /// Latitude in decimal degrees. Required.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees. Required.
    pub longitude: Option<f64>,
    /// Creation time; stamped by the publisher when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl ReportDraft {
    /// Draft located at `location` with every optional field left empty.
    pub fn at(location: GeoPoint) -> Self {
        Self {
            latitude: Some(location.latitude()),
            longitude: Some(location.longitude()),
            ..Self::default()
        }
    }

    /// Validate the draft and fill defaults.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use cartwatch::domain::{AuthorId, ReportDraft};
    ///
    /// let draft = ReportDraft {
    ///     latitude: Some(45.52),
    ///     longitude: Some(-122.68),
    ///     ..ReportDraft::default()
    /// };
    /// let author = AuthorId::new("uid-1").expect("valid author");
    /// let record = draft.into_record(author, Utc::now()).expect("valid draft");
    /// assert_eq!(record.name, "Unknown");
    /// assert_eq!(record.food_type, "other");
    /// ```
    pub fn into_record(
        self,
        owner_id: AuthorId,
        now: DateTime<Utc>,
    ) -> Result<ReportRecord, ReportValidationError> {
        let latitude = self
            .latitude
            .ok_or(ReportValidationError::MissingLatitude)?;
        let longitude = self
            .longitude
            .ok_or(ReportValidationError::MissingLongitude)?;
        let location = GeoPoint::new(latitude, longitude)?;

        Ok(ReportRecord {
            owner_id,
            name: text_or_default(self.name, DEFAULT_NAME),
            description: text_or_default(self.description, DEFAULT_DESCRIPTION),
            food_type: text_or_default(self.food_type, DEFAULT_FOOD_TYPE),
            location,
            timestamp: self.timestamp.unwrap_or(now),
        })
    }
}

fn text_or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

/// Report payload as held by the durable store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    /// Creator of the report.
    pub owner_id: AuthorId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Food type tag.
    pub food_type: String,
    /// Report location.
    #[serde(flatten)]
    pub location: GeoPoint,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl ReportRecord {
    /// Whether the record is older than `staleness` at `now`.
    ///
    /// Age equal to the threshold is not yet stale.
    pub fn is_stale(&self, now: DateTime<Utc>, staleness: Duration) -> bool {
        match TimeDelta::from_std(staleness) {
            Ok(threshold) => now.signed_duration_since(self.timestamp) > threshold,
            Err(_) => false,
        }
    }
}

/// A hydrated report: store record plus its identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Store-allocated identifier.
    pub id: ReportId,
    /// Stored fields.
    #[serde(flatten)]
    pub record: ReportRecord,
}

impl Report {
    /// Pair a record with its identifier.
    pub fn new(id: ReportId, record: ReportRecord) -> Self {
        Self { id, record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use serde_json::Value;

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0)
            .single()
            .expect("valid time")
    }

    #[fixture]
    fn author() -> AuthorId {
        AuthorId::new("uid-7").expect("valid author")
    }

    #[rstest]
    fn fills_defaults_and_stamps_timestamp(now: DateTime<Utc>, author: AuthorId) {
        let draft = ReportDraft {
            name: Some("   ".to_owned()),
            latitude: Some(45.0),
            longitude: Some(-122.0),
            ..ReportDraft::default()
        };

        let record = draft.into_record(author.clone(), now).expect("valid draft");

        assert_eq!(record.owner_id, author);
        assert_eq!(record.name, DEFAULT_NAME);
        assert_eq!(record.description, DEFAULT_DESCRIPTION);
        assert_eq!(record.food_type, DEFAULT_FOOD_TYPE);
        assert_eq!(record.timestamp, now);
    }

    #[rstest]
    fn keeps_supplied_fields(now: DateTime<Utc>, author: AuthorId) {
        let earlier = now - TimeDelta::minutes(3);
        let draft = ReportDraft {
            name: Some("Tacos El Gordo".to_owned()),
            description: Some("al pastor".to_owned()),
            food_type: Some("taco".to_owned()),
            latitude: Some(32.7),
            longitude: Some(-117.1),
            timestamp: Some(earlier),
        };

        let record = draft.into_record(author, now).expect("valid draft");

        assert_eq!(record.name, "Tacos El Gordo");
        assert_eq!(record.food_type, "taco");
        assert_eq!(record.timestamp, earlier);
    }

    #[rstest]
    #[case(None, Some(1.0), ReportValidationError::MissingLatitude)]
    #[case(Some(1.0), None, ReportValidationError::MissingLongitude)]
    #[case(
        Some(120.0),
        Some(1.0),
        ReportValidationError::InvalidLocation(GeoPointValidationError::Latitude(120.0))
    )]
    fn rejects_missing_or_invalid_coordinates(
        now: DateTime<Utc>,
        author: AuthorId,
        #[case] latitude: Option<f64>,
        #[case] longitude: Option<f64>,
        #[case] expected: ReportValidationError,
    ) {
        let draft = ReportDraft {
            latitude,
            longitude,
            ..ReportDraft::default()
        };
        let error = draft.into_record(author, now).expect_err("invalid draft");
        assert_eq!(error, expected);
    }

    #[rstest]
    #[case(11, true)]
    #[case(10, false)]
    #[case(9, false)]
    fn staleness_is_strictly_greater_than_threshold(
        now: DateTime<Utc>,
        author: AuthorId,
        #[case] age_minutes: i64,
        #[case] expected: bool,
    ) {
        let draft = ReportDraft {
            timestamp: Some(now - TimeDelta::minutes(age_minutes)),
            ..ReportDraft::at(GeoPoint::new(0.0, 0.0).expect("valid point"))
        };
        let record = draft.into_record(author, now).expect("valid draft");
        assert_eq!(
            record.is_stale(now, Duration::from_secs(600)),
            expected
        );
    }

    #[rstest]
    fn draft_accepts_legacy_foodtype_key() {
        let draft: ReportDraft =
            serde_json::from_str(r#"{"foodtype":"coffee","latitude":1.0,"longitude":2.0}"#)
                .expect("draft parses");
        assert_eq!(draft.food_type.as_deref(), Some("coffee"));
    }

    #[rstest]
    fn report_serialises_flat_camel_case(now: DateTime<Utc>, author: AuthorId) {
        let record = ReportDraft::at(GeoPoint::new(1.5, 2.5).expect("valid point"))
            .into_record(author, now)
            .expect("valid draft");
        let report = Report::new(ReportId::new("r-1").expect("valid id"), record);

        let value = serde_json::to_value(&report).expect("report serialises");

        assert_eq!(value.get("id").and_then(Value::as_str), Some("r-1"));
        assert_eq!(value.get("ownerId").and_then(Value::as_str), Some("uid-7"));
        assert_eq!(value.get("foodType").and_then(Value::as_str), Some("other"));
        assert_eq!(value.get("latitude").and_then(Value::as_f64), Some(1.5));
        assert_eq!(value.get("longitude").and_then(Value::as_f64), Some(2.5));
    }
}
