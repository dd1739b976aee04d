//! Ingest Route
//!
//! - POST /api/createFMIACP - Store one event and update the latest state
//!
//! Responds with the boolean result of the store upsert. A failed upsert
//! is still `200 false`, not an error status.

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::api::auth::AuthenticatedUser;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::ingest::RawEvent;

/// POST /api/createFMIACP
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<RawEvent>, JsonRejection>,
) -> ApiResult<Json<bool>> {
    let counters = state.engine.counters();
    counters.record_input_request();

    let Json(event) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let record = event.validate()?;
    counters.record_input();

    tracing::debug!(
        user = %user.0,
        machine = %record.machine_name,
        signal_type = %record.signal_type,
        "Ingesting record"
    );

    // Run to completion even if the request times out
    let ingest = state.ingest.clone();
    let stored = tokio::spawn(async move { ingest.ingest(record).await })
        .await
        .map_err(|e| ApiError::Internal(format!("Ingest task failed: {}", e)))?;

    Ok(Json(stored))
}
