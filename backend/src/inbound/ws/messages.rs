//! Wire-level message definitions for the nearby WebSocket feed.
//!
//! Proximity events are transformed into these payloads before being
//! serialized to JSON and sent to connected clients. Every frame carries a
//! `type` tag.

use serde::{Deserialize, Serialize};

use crate::domain::{Error, ErrorCode, ProximityEvent, Report};

/// Inbound criteria update sent by the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CriteriaUpdateRequest {
    /// Move the query centre.
    UpdateCenter { latitude: f64, longitude: f64 },
    /// Resize the query.
    UpdateRadius {
        #[serde(rename = "radiusKm")]
        radius_km: f64,
    },
}

/// Outbound frame emitted to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NearbyMessage {
    /// A report came into range.
    Entered { report: Report },
    /// A report moved while in range.
    Moved { report: Report },
    /// A report left range or was evicted.
    Exited { id: String },
    /// A client request was rejected; the feed stays open.
    Error { code: ErrorCode, message: String },
}

impl From<ProximityEvent> for NearbyMessage {
    fn from(value: ProximityEvent) -> Self {
        match value {
            ProximityEvent::ReportEntered(report) => Self::Entered { report },
            ProximityEvent::ReportMoved(report) => Self::Moved { report },
            ProximityEvent::ReportExited(id) => Self::Exited {
                id: id.as_str().to_owned(),
            },
        }
    }
}

impl From<&Error> for NearbyMessage {
    fn from(value: &Error) -> Self {
        Self::Error {
            code: value.code(),
            message: value.message().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::*;
    use crate::domain::{AuthorId, GeoPoint, ReportDraft, ReportId};

    #[rstest]
    #[case(r#"{"type":"updateCenter","latitude":1.5,"longitude":-2.0}"#,
        CriteriaUpdateRequest::UpdateCenter { latitude: 1.5, longitude: -2.0 })]
    #[case(r#"{"type":"updateRadius","radiusKm":2.5}"#,
        CriteriaUpdateRequest::UpdateRadius { radius_km: 2.5 })]
    fn parses_criteria_updates(#[case] raw: &str, #[case] expected: CriteriaUpdateRequest) {
        let parsed: CriteriaUpdateRequest = serde_json::from_str(raw).expect("valid request");
        assert_eq!(parsed, expected);
    }

    #[rstest]
    fn rejects_unknown_request_types() {
        let parsed = serde_json::from_str::<CriteriaUpdateRequest>(r#"{"type":"teleport"}"#);
        assert!(parsed.is_err());
    }

    #[rstest]
    fn entered_frames_carry_the_flattened_report() {
        let now = Utc
            .with_ymd_and_hms(2026, 6, 1, 8, 0, 0)
            .single()
            .expect("valid time");
        let record = ReportDraft {
            food_type: Some("coffee".to_owned()),
            ..ReportDraft::at(GeoPoint::new(10.0, 20.0).expect("valid point"))
        }
        .into_record(AuthorId::new("uid").expect("valid author"), now)
        .expect("valid draft");
        let report = Report::new(ReportId::new("r-1").expect("valid id"), record);

        let frame = serde_json::to_value(NearbyMessage::from(ProximityEvent::ReportEntered(report)))
            .expect("frame serializes");

        assert_eq!(frame.get("type").and_then(Value::as_str), Some("entered"));
        let report = frame.get("report").expect("report payload");
        assert_eq!(report.get("id").and_then(Value::as_str), Some("r-1"));
        assert_eq!(report.get("foodType").and_then(Value::as_str), Some("coffee"));
        assert_eq!(report.get("longitude").and_then(Value::as_f64), Some(20.0));
    }

    #[rstest]
    fn exited_and_error_frames_are_tagged() {
        let exited = NearbyMessage::from(ProximityEvent::ReportExited(
            ReportId::new("r-9").expect("valid id"),
        ));
        let error = NearbyMessage::from(&Error::invalid_request("radius must be positive"));

        assert_eq!(
            serde_json::to_value(exited).expect("serializes"),
            json!({ "type": "exited", "id": "r-9" })
        );
        assert_eq!(
            serde_json::to_value(error).expect("serializes"),
            json!({
                "type": "error",
                "code": "invalid_request",
                "message": "radius must be positive",
            })
        );
    }
}
