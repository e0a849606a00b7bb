//! One decision cycle: snapshot -> decide -> risk-gate -> route -> persist.
//!
//! Shared by the execute-enhanced endpoint and the background scheduler. The
//! whole sequence runs under the model's execution lock so a trade's balance
//! update is always visible to the next evaluation.

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use risk_manager::{ProposedOrder, RiskVerdict};
use tradepilot_core::api::exchange::ExchangeApi;
use tradepilot_core::types::{
    AutomationLevel, Environment, IncidentKind, IncidentSeverity, Model, Signal, TradeDecision,
};
use trading_engine::router::ExecutionOutcome;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Result of one decision cycle.
#[derive(Debug, Serialize, ToSchema)]
pub struct CycleOutcome {
    pub model_id: Uuid,
    pub decision: TradeDecision,
    pub verdict: RiskVerdict,
    /// Present when the decision was routed; absent on risk rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionOutcome>,
    pub rejected_by_risk: bool,
}

/// Run one decision cycle for a model.
pub async fn run_cycle(state: &AppState, model_id: Uuid) -> ApiResult<CycleOutcome> {
    let lock = state.lock_for(model_id);
    let _guard = lock.lock().await;

    let model = state
        .models
        .get(model_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {model_id} not found")))?;
    if !model.active {
        return Err(ApiError::Validation(format!(
            "model {model_id} is paused"
        )));
    }
    let settings = state
        .models
        .get_settings(model_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("risk settings for {model_id} missing")))?;

    let snapshot = state.trades.snapshot(&model).await?;
    let decision = state.provider.decide(&model, &snapshot).await?;

    let proposed = (decision.signal != Signal::Hold).then(|| ProposedOrder {
        coin: decision.coin.clone(),
        signal: decision.signal,
        quantity: decision.quantity,
        price: decision.reference_price,
        leverage: decision.leverage,
    });

    let verdict = state
        .evaluator
        .evaluate(&snapshot, &settings, proposed.as_ref());
    record_new_danger_states(state, model_id, &verdict).await;

    if !verdict.accept {
        info!(
            model_id = %model_id,
            hard = verdict.hard_violations,
            soft = verdict.soft_violations,
            "Decision rejected by risk evaluation"
        );
        return Ok(CycleOutcome {
            model_id,
            decision,
            verdict,
            execution: None,
            rejected_by_risk: true,
        });
    }

    let exchange = resolve_exchange(state, &model).await?;
    let execution = state
        .router
        .route(&model, &decision, exchange.as_deref())
        .await?;

    Ok(CycleOutcome {
        model_id,
        decision,
        verdict,
        execution: Some(execution),
        rejected_by_risk: false,
    })
}

/// Build the exchange client when (and only when) the route will need it.
pub async fn resolve_exchange(
    state: &AppState,
    model: &Model,
) -> ApiResult<Option<Box<dyn ExchangeApi>>> {
    let needs_exchange = model.environment == Environment::Live
        && model.automation_level == AutomationLevel::FullyAutomated;
    if !needs_exchange {
        return Ok(None);
    }
    let client = state.credentials.get_client(model).await?;
    Ok(client.map(|c| Box::new(c) as Box<dyn ExchangeApi>))
}

/// Persist one incident per newly-entered danger state (edge-triggered).
pub async fn record_new_danger_states(state: &AppState, model_id: Uuid, verdict: &RiskVerdict) {
    let newly = state.risk_tracker.observe(model_id, &verdict.readings);
    for reading in newly {
        let message = format!(
            "Risk limit breached: {} at {} against limit {}",
            reading.metric.as_str(),
            reading.current,
            reading.limit
        );
        if let Err(e) = state
            .incidents
            .record(
                model_id,
                IncidentKind::RiskViolation,
                IncidentSeverity::Danger,
                message,
            )
            .await
        {
            warn!(model_id = %model_id, error = %e, "Failed to record risk incident");
        }
    }
}
