//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ReportPublisher;
use crate::domain::ports::ReportStore;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub publisher: Arc<ReportPublisher>,
    pub store: Arc<dyn ReportStore>,
}

impl HttpState {
    /// Construct state from the publishing service and the store it writes to.
    pub fn new(publisher: Arc<ReportPublisher>, store: Arc<dyn ReportStore>) -> Self {
        Self { publisher, store }
    }
}
