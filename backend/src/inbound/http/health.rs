//! Orchestrator probes backed by a single service phase.
//!
//! The service starts in [`ServicePhase::Starting`], moves to
//! [`ServicePhase::Serving`] once the listener is bound, and ends in
//! [`ServicePhase::Draining`] after the server stops accepting work.
//! Readiness holds only while serving; liveness fails only while draining.

use std::sync::atomic::{AtomicU8, Ordering};

use actix_web::{HttpResponse, get, http::header, web};

/// Lifecycle stage reported by the probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServicePhase {
    /// Listener not yet bound.
    Starting = 0,
    /// Accepting requests and feeds.
    Serving = 1,
    /// Shutting down.
    Draining = 2,
}

impl ServicePhase {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Serving,
            _ => Self::Draining,
        }
    }
}

/// Shared phase read by the probe handlers.
#[derive(Debug)]
pub struct HealthState {
    phase: AtomicU8,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            phase: AtomicU8::new(ServicePhase::Starting as u8),
        }
    }
}

impl HealthState {
    /// State in the starting phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> ServicePhase {
        ServicePhase::from_raw(self.phase.load(Ordering::Acquire))
    }

    /// Enter the serving phase unless draining already began.
    pub fn mark_ready(&self) {
        let _ = self.phase.compare_exchange(
            ServicePhase::Starting as u8,
            ServicePhase::Serving as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Enter the draining phase. Terminal.
    pub fn mark_unhealthy(&self) {
        self.phase
            .store(ServicePhase::Draining as u8, Ordering::Release);
    }

    /// Whether the readiness probe passes.
    pub fn is_ready(&self) -> bool {
        self.phase() == ServicePhase::Serving
    }

    /// Whether the liveness probe passes.
    pub fn is_alive(&self) -> bool {
        self.phase() != ServicePhase::Draining
    }
}

fn probe_response(passing: bool) -> HttpResponse {
    let mut builder = if passing {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    builder
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

/// 200 while serving, 503 otherwise.
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    probe_response(state.is_ready())
}

/// 200 until draining starts.
#[get("/health/live")]
pub async fn live(state: web::Data<HealthState>) -> HttpResponse {
    probe_response(state.is_alive())
}
