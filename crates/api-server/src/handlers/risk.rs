//! Risk monitoring handlers: risk status, incidents, readiness.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use risk_manager::RiskVerdict;
use tradepilot_core::types::{Incident, RiskSettings};
use trading_engine::readiness::{assess, summarize, ReadinessReport};

use crate::cycle::record_new_danger_states;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Current risk standing for a model.
#[derive(Debug, Serialize, ToSchema)]
pub struct RiskStatusResponse {
    pub model_id: Uuid,
    pub settings: RiskSettings,
    pub verdict: RiskVerdict,
}

/// Evaluate the model's current portfolio against its limits.
///
/// Polled by the dashboard; incident emission is edge-triggered, so repeated
/// polls of a persisting danger state log exactly one incident.
#[utoipa::path(
    get,
    path = "/api/models/{id}/risk-status",
    tag = "risk",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Per-metric risk standing", body = RiskStatusResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_risk_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RiskStatusResponse>> {
    let model = state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;
    let settings = state
        .models
        .get_settings(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("risk settings for model {id} not found")))?;

    let snapshot = state.trades.snapshot(&model).await?;
    let verdict = state.evaluator.evaluate(&snapshot, &settings, None);
    record_new_danger_states(&state, id, &verdict).await;

    Ok(Json(RiskStatusResponse {
        model_id: id,
        settings,
        verdict,
    }))
}

/// Recent incidents for a model, newest first.
#[utoipa::path(
    get,
    path = "/api/models/{id}/incidents",
    tag = "risk",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Incident log", body = [Incident]),
        (status = 404, description = "Model not found")
    )
)]
pub async fn list_incidents(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Incident>>> {
    state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;
    let incidents = state.incidents.list(id, 100).await?;
    Ok(Json(incidents))
}

/// Readiness/graduation assessment from the accumulated ledger.
#[utoipa::path(
    get,
    path = "/api/models/{id}/readiness",
    tag = "risk",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Readiness report", body = ReadinessReport),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_readiness(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReadinessReport>> {
    let model = state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;

    let trades = state.trades.list_trades_chronological(id).await?;
    let summary = summarize(&trades, model.initial_capital);
    let report = assess(summary, &state.readiness_criteria);
    Ok(Json(report))
}
