//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::sync::Arc;

use cartwatch::domain::ports::{ReportStore, SpatialIndex};
use cartwatch::domain::{RadiusKm, ReportPublisher};

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) default_radius: RadiusKm,
    pub(crate) store: Arc<dyn ReportStore>,
    pub(crate) index: Arc<dyn SpatialIndex>,
    pub(crate) publisher: Arc<ReportPublisher>,
}

impl ServerConfig {
    /// Construct a server configuration over the shared adapters.
    #[must_use]
    pub fn new(
        bind_addr: SocketAddr,
        store: Arc<dyn ReportStore>,
        index: Arc<dyn SpatialIndex>,
        publisher: Arc<ReportPublisher>,
    ) -> Self {
        Self {
            bind_addr,
            default_radius: RadiusKm::default(),
            store,
            index,
            publisher,
        }
    }

    /// Override the radius used when a nearby subscription omits one.
    #[must_use]
    pub fn with_default_radius(mut self, radius: RadiusKm) -> Self {
        self.default_radius = radius;
        self
    }
}
