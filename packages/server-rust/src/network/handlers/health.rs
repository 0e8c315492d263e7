//! `/health`, `/health/live` and `/health/ready`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::network::HealthState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub state: &'static str,
    /// Stored items, soft-deleted ones included.
    pub items: usize,
    pub in_flight: u64,
    pub uptime_secs: u64,
    /// Set once a fatal store fault has started shutdown.
    pub fatal: Option<String>,
}

/// Always 200; `state` says whether requests are being accepted.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        state: state.shutdown.health_state().as_str(),
        items: state.store.size(),
        in_flight: state.shutdown.in_flight_count(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        fatal: state.shutdown.fatal_reason(),
    })
}

pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 only while `Ready`; 503 before startup completes and once draining.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    match state.shutdown.health_state() {
        HealthState::Ready => StatusCode::OK,
        HealthState::Starting | HealthState::Draining | HealthState::Stopped => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
