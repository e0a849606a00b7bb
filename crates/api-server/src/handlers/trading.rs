//! Trading handlers: decision cycles, trades, portfolio, emergency stop.

use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use tradepilot_core::types::{IncidentKind, IncidentSeverity, Position, Trade};

use crate::cycle::{run_cycle, CycleOutcome};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// One position with its mark and unrealized P&L.
#[derive(Debug, Serialize, ToSchema)]
pub struct PositionView {
    #[serde(flatten)]
    pub position: Position,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Authoritative portfolio view; the dashboard renders this as-is.
#[derive(Debug, Serialize, ToSchema)]
pub struct PortfolioResponse {
    pub model_id: Uuid,
    pub cash: Decimal,
    pub initial_capital: Decimal,
    pub peak_value: Decimal,
    pub total_value: Decimal,
    pub realized_pnl_today: Decimal,
    pub unrealized_pnl: Decimal,
    pub trades_today: i64,
    pub open_positions: usize,
    pub positions: Vec<PositionView>,
}

/// Emergency stop summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct EmergencyStopResponse {
    /// Models flipped to simulation + manual.
    pub stopped_models: Vec<Uuid>,
    /// In-flight exchange orders are NOT cancelled; execution is only
    /// prevented going forward.
    pub note: String,
}

/// Run one decision cycle for a model.
#[utoipa::path(
    post,
    path = "/api/models/{id}/execute-enhanced",
    tag = "trading",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Cycle outcome", body = CycleOutcome),
        (status = 404, description = "Model not found"),
        (status = 422, description = "Model paused or decision invalid"),
        (status = 502, description = "Exchange rejected the order")
    )
)]
pub async fn execute_cycle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CycleOutcome>> {
    let outcome = run_cycle(&state, id).await?;
    Ok(Json(outcome))
}

/// Recent trades for a model, newest first.
#[utoipa::path(
    get,
    path = "/api/models/{id}/trades",
    tag = "trading",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Trade ledger", body = [Trade]),
        (status = 404, description = "Model not found")
    )
)]
pub async fn list_trades(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Trade>>> {
    ensure_model(&state, id).await?;
    let trades = state.trades.list_trades(id, 200).await?;
    Ok(Json(trades))
}

/// Current portfolio: cash, positions, marks, aggregates.
#[utoipa::path(
    get,
    path = "/api/models/{id}/portfolio",
    tag = "trading",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Portfolio state", body = PortfolioResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PortfolioResponse>> {
    let model = state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;

    let snapshot = state.trades.snapshot(&model).await?;

    let mut positions = Vec::with_capacity(snapshot.positions.len());
    for position in &snapshot.positions {
        let mark_price = state
            .trades
            .last_price(id, &position.coin)
            .await?
            .unwrap_or(position.avg_entry_price);
        positions.push(PositionView {
            unrealized_pnl: position.unrealized_pnl(mark_price),
            mark_price,
            position: position.clone(),
        });
    }

    Ok(Json(PortfolioResponse {
        model_id: id,
        cash: snapshot.cash,
        initial_capital: snapshot.initial_capital,
        peak_value: snapshot.peak_value,
        total_value: snapshot.total_value(),
        realized_pnl_today: snapshot.realized_pnl_today,
        unrealized_pnl: snapshot.unrealized_pnl,
        trades_today: snapshot.trades_today,
        open_positions: snapshot.open_positions(),
        positions,
    }))
}

/// Flip every model to simulation + manual.
///
/// Deliberately does not attempt to cancel orders already in flight at the
/// exchange; this prevents future automated execution only.
#[utoipa::path(
    post,
    path = "/api/emergency-stop-all",
    tag = "trading",
    responses(
        (status = 200, description = "Stop applied", body = EmergencyStopResponse)
    )
)]
pub async fn emergency_stop_all(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<EmergencyStopResponse>> {
    let stopped = state.models.emergency_stop_all().await?;

    for model_id in &stopped {
        if let Err(e) = state
            .incidents
            .record(
                *model_id,
                IncidentKind::EmergencyStop,
                IncidentSeverity::Warning,
                "Emergency stop: model forced to simulation/manual",
            )
            .await
        {
            warn!(model_id = %model_id, error = %e, "Failed to record emergency-stop incident");
        }
    }

    Ok(Json(EmergencyStopResponse {
        stopped_models: stopped,
        note: "future automated execution disabled; in-flight exchange orders are not cancelled"
            .to_string(),
    }))
}

async fn ensure_model(state: &AppState, id: Uuid) -> ApiResult<()> {
    state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;
    Ok(())
}
