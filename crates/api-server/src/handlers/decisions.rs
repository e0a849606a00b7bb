//! Pending-decision handlers: list, approve, reject.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use tradepilot_core::types::PendingDecision;
use trading_engine::router::ExecutionOutcome;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Query filter for listing decisions.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListDecisionsQuery {
    pub model_id: Option<Uuid>,
}

/// Rejection body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    pub reason: String,
}

/// Approval result: the actioned decision and what executing it produced.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApproveResponse {
    pub decision: PendingDecision,
    pub execution: ExecutionOutcome,
}

/// List pending decisions, lazily expiring any past their TTL first.
#[utoipa::path(
    get,
    path = "/api/pending-decisions",
    tag = "decisions",
    params(ListDecisionsQuery),
    responses(
        (status = 200, description = "Pending decisions", body = [PendingDecision])
    )
)]
pub async fn list_decisions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDecisionsQuery>,
) -> ApiResult<Json<Vec<PendingDecision>>> {
    state
        .pending
        .expire_stale(query.model_id, state.trading.pending_decision_ttl_minutes)
        .await?;
    let decisions = state.pending.list(query.model_id, None).await?;
    Ok(Json(decisions))
}

/// Approve a pending decision and execute it.
///
/// A decision can be actioned exactly once: a second approval (or an
/// approval of an expired/rejected decision) returns 409.
#[utoipa::path(
    post,
    path = "/api/pending-decisions/{id}/approve",
    tag = "decisions",
    params(("id" = Uuid, Path, description = "Pending decision ID")),
    responses(
        (status = 200, description = "Approved and executed", body = ApproveResponse),
        (status = 404, description = "Decision not found"),
        (status = 409, description = "Decision already actioned or expired")
    )
)]
pub async fn approve_decision(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApproveResponse>> {
    let pending = state
        .pending
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("pending decision {id} not found")))?;

    // The full claim -> execute -> persist sequence runs under the model's
    // execution lock so concurrent approvals serialize.
    let lock = state.lock_for(pending.model_id);
    let _guard = lock.lock().await;

    let model = state
        .models
        .get(pending.model_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {} not found", pending.model_id)))?;

    let exchange = match model.environment {
        tradepilot_core::types::Environment::Live => {
            state
                .credentials
                .get_client(&model)
                .await?
                .map(|c| Box::new(c) as Box<dyn tradepilot_core::api::ExchangeApi>)
        }
        tradepilot_core::types::Environment::Simulation => None,
    };

    let (decision, execution) = state
        .approvals
        .approve(&state.router, &model, id, exchange.as_deref())
        .await?;

    Ok(Json(ApproveResponse {
        decision,
        execution,
    }))
}

/// Reject a pending decision with a reason. Nothing executes.
#[utoipa::path(
    post,
    path = "/api/pending-decisions/{id}/reject",
    tag = "decisions",
    params(("id" = Uuid, Path, description = "Pending decision ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rejected decision", body = PendingDecision),
        (status = 404, description = "Decision not found"),
        (status = 409, description = "Decision already actioned or expired")
    )
)]
pub async fn reject_decision(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> ApiResult<Json<PendingDecision>> {
    let decision = state.approvals.reject(id, &request.reason).await?;
    Ok(Json(decision))
}
