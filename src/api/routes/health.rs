//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes.
//! Behind Basic auth like every other route.
//!
//! - GET /health/live - Liveness check (process is alive)
//! - GET /health/ready - Readiness check (store connection is held)

use axum::{extract::State, http::StatusCode};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::store::ConnectionState;

/// GET /health/live
///
/// Kubernetes liveness check.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 while a store connection is held. Does not connect by
/// itself; the periodic reload does that.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.engine.connection_state() {
        ConnectionState::Connected => StatusCode::OK,
        ConnectionState::Disconnected => StatusCode::SERVICE_UNAVAILABLE,
    }
}
