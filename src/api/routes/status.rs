//! Status Route
//!
//! - GET /api/getAppStatusFMIACP - Counters, connection state and process usage
//!
//! Reads only in-memory state; never touches the store.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::StatusResponse;
use crate::api::state::AppState;

pub const SERVICE_NAME: &str = "FMIACP";

/// GET /api/getAppStatusFMIACP
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let engine = &state.engine;
    let counters = engine.counters().snapshot();
    let (usage_memory, usage_cpu) = Arc::clone(engine.usage()).current_blocking().await;

    Json(StatusResponse {
        name: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data_store_size: engine.get_all().await.len(),
        data_store_count: counters.store_success,
        data_store_fail_count: counters.store_failure,
        data_input_count: counters.input,
        data_input_request_count: counters.input_requests,
        data_output_count: counters.output,
        data_output_request_count: counters.output_requests,
        database_connection: engine.connection_state(),
        usage_memory,
        usage_cpu,
        cpu: engine.usage().cpu_percent(),
        latest_state_size: engine.get_latest().await.len(),
        last_reload: engine.last_reload().await.map(|t| t.to_rfc3339()),
        uptime_seconds: state.uptime_seconds(),
    })
}
