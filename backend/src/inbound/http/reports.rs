//! Report HTTP handlers.
//!
//! ```text
//! POST /api/v1/reports
//! POST /api/v1/reports/{id}/index
//! GET  /api/v1/reports/{id}
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::Serialize;
use serde_json::json;

use crate::domain::{Error, Report, ReportDraft, ReportId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::author::AuthorContext;
use crate::inbound::http::state::HttpState;

/// Response payload for a published report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedReportBody {
    pub id: String,
}

fn parse_report_id(raw: String) -> Result<ReportId, Error> {
    ReportId::new(raw).map_err(|error| {
        Error::invalid_request(error.to_string()).with_details(json!({
            "field": "id",
            "code": "invalid_report_id",
        }))
    })
}

/// JSON body configuration that reports malformed payloads as domain errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|error, _req| {
        Error::invalid_request(format!("invalid report payload: {error}")).into()
    })
}

/// Publish a new report for the calling author.
#[post("/reports")]
pub async fn publish_report(
    state: web::Data<HttpState>,
    author: AuthorContext,
    payload: web::Json<ReportDraft>,
) -> ApiResult<HttpResponse> {
    let id = state
        .publisher
        .publish(payload.into_inner(), author.author_id())
        .await?;
    Ok(HttpResponse::Created().json(PublishedReportBody {
        id: id.as_str().to_owned(),
    }))
}

/// Re-run the index step for a report whose indexing failed.
#[post("/reports/{id}/index")]
pub async fn retry_indexing(
    state: web::Data<HttpState>,
    _author: AuthorContext,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_report_id(path.into_inner())?;
    state.publisher.retry_indexing(&id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Fetch a single report by id.
#[get("/reports/{id}")]
pub async fn get_report(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<Report>> {
    let id = parse_report_id(path.into_inner())?;
    let record = state
        .store
        .get(&id)
        .await
        .map_err(|error| Error::service_unavailable(error.to_string()))?
        .ok_or_else(|| {
            Error::not_found(format!("report {id} not found"))
                .with_details(json!({ "reportId": id.as_str() }))
        })?;
    Ok(web::Json(Report::new(id, record)))
}

#[cfg(test)]
#[path = "reports_tests.rs"]
mod tests;
