//! Service status endpoints

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{ServiceHistoryResponse, ServicesResponse},
};
use crate::status::StatusSample;

/// GET /api
///
/// Complete status history of every monitored service
pub async fn history(State(state): State<ApiState>) -> Json<HashMap<String, Vec<StatusSample>>> {
    let mut snapshot = state.store.snapshot().await;
    snapshot.retain(|name, _| state.is_monitored(name));

    for name in state.services.iter() {
        snapshot.entry(name.clone()).or_default();
    }

    Json(snapshot)
}

/// GET /api/services
pub async fn list_services(State(state): State<ApiState>) -> Json<ServicesResponse> {
    let services = super::summarize(&state).await;
    let count = services.len();

    Json(ServicesResponse { services, count })
}

/// GET /api/services/:name
pub async fn get_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceHistoryResponse>> {
    if !state.is_monitored(&name) {
        return Err(ApiError::NotFound(format!("service {name} is not monitored")));
    }

    let samples = state.store.query(&name).await;
    Ok(Json(ServiceHistoryResponse { name, samples }))
}
