//! Health check handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
}

/// Service liveness + database reachability.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let database = sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .is_ok();

    Ok(Json(HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
    }))
}
