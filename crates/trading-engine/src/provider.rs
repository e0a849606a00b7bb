//! Decision-provider seam.
//!
//! The AI layer that actually queries a chat-completion endpoint is an
//! external collaborator. The engine only needs something that can turn a
//! model + portfolio snapshot into a [`TradeDecision`]; wire a real provider
//! into the app state, or the fixed provider below for tests and dry runs.

use async_trait::async_trait;

use tradepilot_core::types::{Model, PortfolioSnapshot, TradeDecision};
use tradepilot_core::Result;

/// Produces one trade decision per cycle for a model.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn decide(&self, model: &Model, snapshot: &PortfolioSnapshot)
        -> Result<TradeDecision>;
}

/// Always returns the same decision. Default is a hold, which makes an
/// unconfigured deployment a safe no-op.
pub struct FixedDecisionProvider {
    decision: Option<TradeDecision>,
}

impl FixedDecisionProvider {
    pub fn holding() -> Self {
        Self { decision: None }
    }

    pub fn returning(decision: TradeDecision) -> Self {
        Self {
            decision: Some(decision),
        }
    }
}

#[async_trait]
impl DecisionProvider for FixedDecisionProvider {
    async fn decide(
        &self,
        _model: &Model,
        _snapshot: &PortfolioSnapshot,
    ) -> Result<TradeDecision> {
        Ok(self
            .decision
            .clone()
            .unwrap_or_else(|| TradeDecision::hold("BTC", "no decision provider configured")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tradepilot_core::types::{
        AutomationLevel, Environment, ExchangeEnvironment, Signal,
    };
    use uuid::Uuid;

    fn model() -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            ai_provider: "none".to_string(),
            ai_model: "none".to_string(),
            initial_capital: Decimal::new(10_000, 0),
            cash_balance: Decimal::new(10_000, 0),
            peak_value: Decimal::new(10_000, 0),
            environment: Environment::Simulation,
            automation_level: AutomationLevel::Manual,
            exchange_environment: ExchangeEnvironment::Testnet,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn snapshot(model: &Model) -> PortfolioSnapshot {
        PortfolioSnapshot {
            model_id: model.id,
            cash: model.cash_balance,
            initial_capital: model.initial_capital,
            peak_value: model.peak_value,
            positions: vec![],
            position_value: Decimal::ZERO,
            realized_pnl_today: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            trades_today: 0,
            taken_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unconfigured_provider_holds() {
        let provider = FixedDecisionProvider::holding();
        let model = model();
        let decision = provider.decide(&model, &snapshot(&model)).await.unwrap();
        assert_eq!(decision.signal, Signal::Hold);
    }

    #[tokio::test]
    async fn fixed_provider_echoes_decision() {
        let wanted = TradeDecision {
            coin: "ETH".to_string(),
            signal: Signal::BuyToEnter,
            quantity: Decimal::ONE,
            leverage: Decimal::ONE,
            confidence: 0.7,
            justification: "momentum".to_string(),
            reference_price: Decimal::new(3_000, 0),
        };
        let provider = FixedDecisionProvider::returning(wanted.clone());
        let model = model();
        let decision = provider.decide(&model, &snapshot(&model)).await.unwrap();
        assert_eq!(decision.signal, Signal::BuyToEnter);
        assert_eq!(decision.coin, "ETH");
    }
}
