//! Pending-decision approval lifecycle.
//!
//! `pending -> {approved, rejected, expired}`, all terminal. Acting on a
//! terminal decision is a distinct error, never a silent no-op; that guard
//! is what prevents a double-click from executing twice.

use chrono::{DateTime, Utc};
use tracing::info;

use tradepilot_core::api::exchange::ExchangeApi;
use tradepilot_core::db::PendingDecisionRepository;
use tradepilot_core::types::{DecisionStatus, Environment, Model, PendingDecision};
use tradepilot_core::{Error, Result};
use uuid::Uuid;

use crate::router::{ExecutionOutcome, OrderRouter};

/// Guard an action against a decision's current state. Pure.
pub fn ensure_actionable(
    decision: &PendingDecision,
    ttl_minutes: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    if decision.status.is_terminal() {
        return Err(Error::DecisionNotActionable(format!(
            "decision {} is already {}",
            decision.id,
            decision.status.as_str()
        )));
    }
    if decision.is_past_ttl(ttl_minutes, now) {
        return Err(Error::DecisionNotActionable(format!(
            "decision {} expired {} minutes after creation",
            decision.id, ttl_minutes
        )));
    }
    Ok(())
}

/// Approve/reject service over the pending-decision store.
pub struct ApprovalService {
    decisions: PendingDecisionRepository,
    ttl_minutes: i64,
}

impl ApprovalService {
    pub fn new(decisions: PendingDecisionRepository, ttl_minutes: i64) -> Self {
        Self {
            decisions,
            ttl_minutes,
        }
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl_minutes
    }

    async fn claim(&self, id: Uuid, status: DecisionStatus, reason: Option<&str>) -> Result<PendingDecision> {
        let decision = self
            .decisions
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("pending decision {id} not found")))?;

        if let Err(e) = ensure_actionable(&decision, self.ttl_minutes, Utc::now()) {
            // Persist the lazy expiry transition before reporting it.
            if !decision.status.is_terminal() {
                self.decisions
                    .mark_actioned(id, DecisionStatus::Expired, None)
                    .await?;
            }
            return Err(e);
        }

        // Atomic claim: a concurrent action already past this point wins, and
        // this call reports the conflict instead of acting twice.
        let claimed = self.decisions.mark_actioned(id, status, reason).await?;
        if !claimed {
            return Err(Error::DecisionNotActionable(format!(
                "decision {id} was actioned concurrently"
            )));
        }

        Ok(decision)
    }

    /// Approve a pending decision and execute it through the router.
    ///
    /// An approved decision executes per the model's *current* environment:
    /// a model flipped back to simulation (e.g. by an emergency stop) fills
    /// on the paper ledger, not the exchange.
    pub async fn approve(
        &self,
        router: &OrderRouter,
        model: &Model,
        decision_id: Uuid,
        exchange: Option<&dyn ExchangeApi>,
    ) -> Result<(PendingDecision, ExecutionOutcome)> {
        let decision = self.claim(decision_id, DecisionStatus::Approved, None).await?;
        let trade_decision = decision.decision();

        let outcome = match model.environment {
            Environment::Simulation => {
                router
                    .route(model, &trade_decision, None)
                    .await?
            }
            Environment::Live => {
                router
                    .execute_live(model, &trade_decision, exchange)
                    .await?
            }
        };

        info!(
            decision_id = %decision_id,
            model_id = %model.id,
            "Pending decision approved and executed"
        );

        let refreshed = self
            .decisions
            .get(decision_id)
            .await?
            .unwrap_or(decision);
        Ok((refreshed, outcome))
    }

    /// Reject a pending decision with a reason. No execution occurs.
    pub async fn reject(&self, decision_id: Uuid, reason: &str) -> Result<PendingDecision> {
        self.claim(decision_id, DecisionStatus::Rejected, Some(reason))
            .await?;
        info!(decision_id = %decision_id, reason, "Pending decision rejected");
        self.decisions
            .get(decision_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("pending decision {decision_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tradepilot_core::types::Signal;

    fn decision(status: DecisionStatus, age_minutes: i64) -> PendingDecision {
        PendingDecision {
            id: Uuid::new_v4(),
            model_id: Uuid::new_v4(),
            coin: "BTC".to_string(),
            signal: Signal::BuyToEnter,
            quantity: Decimal::ONE,
            leverage: Decimal::ONE,
            confidence: 0.8,
            justification: "test".to_string(),
            reference_price: Decimal::new(50_000, 0),
            status,
            rejection_reason: None,
            created_at: Utc::now() - chrono::Duration::minutes(age_minutes),
            actioned_at: None,
        }
    }

    #[test]
    fn pending_within_ttl_is_actionable() {
        let d = decision(DecisionStatus::Pending, 5);
        assert!(ensure_actionable(&d, 30, Utc::now()).is_ok());
    }

    #[test]
    fn terminal_states_are_not_actionable() {
        for status in [
            DecisionStatus::Approved,
            DecisionStatus::Rejected,
            DecisionStatus::Expired,
        ] {
            let d = decision(status, 5);
            let err = ensure_actionable(&d, 30, Utc::now()).unwrap_err();
            assert!(matches!(err, Error::DecisionNotActionable(_)));
        }
    }

    #[test]
    fn stale_pending_is_not_actionable() {
        let d = decision(DecisionStatus::Pending, 45);
        let err = ensure_actionable(&d, 30, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::DecisionNotActionable(_)));
    }

    #[test]
    fn approving_an_approved_decision_errors_distinctly() {
        // The double-approval guard is state-based: once approved, the
        // second approval must surface a conflict, not execute again.
        let d = decision(DecisionStatus::Approved, 1);
        let err = ensure_actionable(&d, 30, Utc::now()).unwrap_err();
        match err {
            Error::DecisionNotActionable(message) => {
                assert!(message.contains("already approved"));
            }
            other => panic!("expected DecisionNotActionable, got {other:?}"),
        }
    }
}
