//! HTTP inbound adapter exposing REST endpoints.

pub mod author;
pub mod error;
pub mod health;
pub mod reports;
pub mod state;

use actix_web::web;

pub use error::ApiResult;

/// Register the versioned report API.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(reports::json_config())
            .service(reports::publish_report)
            .service(reports::retry_indexing)
            .service(reports::get_report),
    );
}
