//! Service entry-point: wires the report API, the nearby WebSocket feed, and
//! the staleness sweeper over in-memory adapters.

mod server;

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use cartwatch::config::SyncSettings;
use cartwatch::domain::ports::{ReportStore, SpatialIndex};
use cartwatch::domain::{ReportPublisher, StalenessSweeper};
use cartwatch::inbound::http::health::HealthState;
use cartwatch::outbound::memory::{InMemoryReportStore, InMemorySpatialIndex};
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = SyncSettings::load()
        .map_err(|e| std::io::Error::other(format!("failed to load configuration: {e}")))?;
    let bind_addr = settings.bind_address()?;

    let store: Arc<dyn ReportStore> = Arc::new(InMemoryReportStore::new());
    let index: Arc<dyn SpatialIndex> = Arc::new(InMemorySpatialIndex::new());
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let publisher = Arc::new(ReportPublisher::new(
        store.clone(),
        index.clone(),
        clock.clone(),
    ));
    let sweeper = Arc::new(StalenessSweeper::new(
        store.clone(),
        index.clone(),
        clock,
        settings.sweeper_config(),
    ));
    let sweeper_handle = sweeper.spawn();

    let health_state = web::Data::new(HealthState::new());
    let config = ServerConfig::new(bind_addr, store, index, publisher)
        .with_default_radius(settings.default_radius());
    let server = create_server(health_state.clone(), config)?;
    info!(address = %bind_addr, "cartwatch listening");

    let result = server.await;
    health_state.mark_unhealthy();
    sweeper_handle.stop().await;
    info!("cartwatch stopped");
    result
}
