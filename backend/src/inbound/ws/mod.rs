//! WebSocket inbound adapter streaming nearby reports to clients.
//!
//! Responsibilities:
//! - validate upgrade requests (centre and radius)
//! - open a proximity subscription for the connection
//! - keep WebSocket-specific concerns at the edge of the system

use actix_web::web::{self, Payload};
use actix_web::{HttpRequest, HttpResponse, get};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::domain::{Error, GeoPoint, ProximitySubscription, RadiusKm, SearchArea};

mod session;

pub mod messages;
pub mod state;

/// Query string accepted by the nearby endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
}

impl NearbyQuery {
    fn search_area(&self, default_radius: RadiusKm) -> Result<SearchArea, Error> {
        let center = GeoPoint::new(self.latitude, self.longitude).map_err(|error| {
            Error::invalid_request(error.to_string())
                .with_details(json!({ "field": "latitude/longitude" }))
        })?;
        let radius = match self.radius_km {
            Some(km) => RadiusKm::new(km).map_err(|error| {
                Error::invalid_request(error.to_string()).with_details(json!({ "field": "radiusKm" }))
            })?,
            None => default_radius,
        };
        Ok(SearchArea::new(center, radius))
    }
}

/// Query string configuration that reports malformed parameters as domain errors.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|error, _req| {
        Error::invalid_request(format!("invalid nearby query: {error}")).into()
    })
}

/// Handle WebSocket upgrade for the `/ws/nearby` endpoint.
#[get("/ws/nearby")]
pub async fn nearby_entry(
    state: web::Data<state::WsState>,
    query: web::Query<NearbyQuery>,
    req: HttpRequest,
    stream: Payload,
) -> Result<HttpResponse, Error> {
    let area = query.search_area(state.default_radius)?;
    let subscription = ProximitySubscription::open(&*state.index, state.store.clone(), area)
        .await
        .map_err(|error| {
            error!(error = %error, "Opening proximity subscription failed");
            Error::service_unavailable("spatial index unavailable")
        })?;

    let (response, session, stream) = actix_ws::handle(&req, stream).map_err(|error| {
        error!(error = %error, "WebSocket upgrade failed");
        Error::invalid_request("WebSocket upgrade required")
    })?;

    info!(center = %area.center, radius = %area.radius, "nearby feed connected");
    actix_web::rt::spawn(session::handle_ws_session(subscription, session, stream));
    Ok(response)
}
