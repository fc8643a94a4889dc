//! Shared WebSocket adapter state.
//!
//! The nearby endpoint opens subscriptions against the injected ports and
//! never constructs adapters itself, so tests can supply in-memory doubles.

use std::sync::Arc;

use crate::domain::RadiusKm;
use crate::domain::ports::{ReportStore, SpatialIndex};

/// Dependency bundle for the nearby WebSocket feed.
#[derive(Clone)]
pub struct WsState {
    pub index: Arc<dyn SpatialIndex>,
    pub store: Arc<dyn ReportStore>,
    pub default_radius: RadiusKm,
}

impl WsState {
    /// Construct state from explicit port implementations.
    pub fn new(
        index: Arc<dyn SpatialIndex>,
        store: Arc<dyn ReportStore>,
        default_radius: RadiusKm,
    ) -> Self {
        Self {
            index,
            store,
            default_radius,
        }
    }
}
