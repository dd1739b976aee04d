//! Read Routes
//!
//! - GET /api/getFMIACP - Full log, most recent ID first
//! - GET /api/getFMIACPCurrent - Latest state per (machine, type)
//!
//! Both trigger a reload before answering. A reload already in progress is
//! not waited on; the current views are served instead.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::RecordFilter;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::store::DataRecord;

/// GET /api/getFMIACP
pub async fn get_all(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RecordFilter>,
) -> ApiResult<Json<Vec<DataRecord>>> {
    refresh(&state).await?;

    let view = state.engine.get_all().await;
    let records = filter.apply(view.iter());
    state.engine.counters().record_output(records.len());

    Ok(Json(records))
}

/// GET /api/getFMIACPCurrent
pub async fn get_current(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RecordFilter>,
) -> ApiResult<Json<Vec<DataRecord>>> {
    refresh(&state).await?;

    let view = state.engine.get_latest().await;
    let records = filter.apply(view.iter());
    state.engine.counters().record_output(records.len());

    Ok(Json(records))
}

/// Count the request and trigger a reload; 503 only when this reload found
/// no store to talk to
async fn refresh(state: &AppState) -> ApiResult<()> {
    state.engine.counters().record_output_request();

    if state.coordinator.trigger().await.is_unavailable() {
        return Err(ApiError::ServiceUnavailable(
            "record store is not reachable".to_string(),
        ));
    }
    Ok(())
}
