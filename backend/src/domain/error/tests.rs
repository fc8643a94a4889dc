//! Tests for the domain error payload and its serde contract.

use super::*;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn detailed_error() -> Error {
    Error::service_unavailable("report store unavailable")
        .with_details(json!({"reportId": "r-1"}))
}

#[rstest]
#[case(Error::invalid_request("bad"), ErrorCode::InvalidRequest)]
#[case(Error::unauthorized("who"), ErrorCode::Unauthorized)]
#[case(Error::not_found("missing"), ErrorCode::NotFound)]
#[case(Error::service_unavailable("down"), ErrorCode::ServiceUnavailable)]
#[case(Error::internal("boom"), ErrorCode::InternalError)]
fn constructors_set_code(#[case] error: Error, #[case] expected: ErrorCode) {
    assert_eq!(error.code(), expected);
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
fn serialises_code_in_snake_case(detailed_error: Error) {
    let value = serde_json::to_value(&detailed_error).expect("error serialises");
    assert_eq!(
        value,
        json!({
            "code": "service_unavailable",
            "message": "report store unavailable",
            "details": {"reportId": "r-1"}
        })
    );
}

#[rstest]
fn deserialisation_round_trips_details(detailed_error: Error) {
    let body = serde_json::to_string(&detailed_error).expect("error serialises");
    let parsed: Error = serde_json::from_str(&body).expect("error parses");
    assert_eq!(parsed, detailed_error);
}

#[rstest]
fn deserialisation_rejects_blank_messages() {
    let parsed = serde_json::from_value::<Error>(json!({
        "code": "not_found",
        "message": "  "
    }));
    assert!(parsed.is_err());
}
