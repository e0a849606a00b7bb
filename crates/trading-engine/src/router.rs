//! Order routing by environment and automation level.
//!
//! The routing table is an exhaustive match over tagged enums, so an
//! unhandled environment/automation combination is a compile error rather
//! than a silent fall-through.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use tradepilot_core::api::exchange::{truncate_to_step, ExchangeApi, OrderSide};
use tradepilot_core::db::{IncidentRepository, PendingDecisionRepository};
use tradepilot_core::types::{
    AutomationLevel, DecisionStatus, Environment, IncidentKind, IncidentSeverity, Model,
    PendingDecision, Signal, Trade, TradeDecision,
};
use tradepilot_core::{Error, Result};

use crate::ledger::LedgerWriter;

/// What to do with an accepted decision, decided purely by model policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePlan {
    /// Apply to the simulated ledger; no exchange involvement.
    ApplySimulated,
    /// Surface to the dashboard only; execute nothing.
    AdvisoryOnly,
    /// Store for human approval.
    QueueForApproval,
    /// Execute against the exchange immediately.
    ExecuteLive,
}

/// The routing table.
pub fn plan_route(environment: Environment, automation: AutomationLevel) -> RoutePlan {
    match (environment, automation) {
        (Environment::Simulation, _) => RoutePlan::ApplySimulated,
        (Environment::Live, AutomationLevel::Manual) => RoutePlan::AdvisoryOnly,
        (Environment::Live, AutomationLevel::SemiAutomated) => RoutePlan::QueueForApproval,
        (Environment::Live, AutomationLevel::FullyAutomated) => RoutePlan::ExecuteLive,
    }
}

/// Result of routing one decision.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Hold signal: nothing to do.
    Held,
    /// Applied to the simulated ledger.
    SimulatedFill { trade: Trade },
    /// Live + manual: decision is advisory only.
    Advisory { decision: TradeDecision },
    /// Live + semi-automated: awaiting human approval.
    Queued { decision: PendingDecision },
    /// Executed on the exchange.
    LiveFill {
        trade: Trade,
        exchange_order_id: String,
    },
}

/// Routes accepted decisions per the model's policy.
pub struct OrderRouter {
    ledger: LedgerWriter,
    decisions: PendingDecisionRepository,
    incidents: IncidentRepository,
    quote_asset: String,
}

impl OrderRouter {
    pub fn new(
        ledger: LedgerWriter,
        decisions: PendingDecisionRepository,
        incidents: IncidentRepository,
        quote_asset: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            decisions,
            incidents,
            quote_asset: quote_asset.into(),
        }
    }

    /// Trading pair for a coin, e.g. `BTC` -> `BTCUSDT`.
    pub fn symbol_for(&self, coin: &str) -> String {
        format!("{}{}", coin.to_uppercase(), self.quote_asset)
    }

    /// Route a decision that already passed risk evaluation. The exchange
    /// client is resolved by the caller (and only touched on the live path).
    pub async fn route(
        &self,
        model: &Model,
        decision: &TradeDecision,
        exchange: Option<&dyn ExchangeApi>,
    ) -> Result<ExecutionOutcome> {
        if decision.signal == Signal::Hold {
            info!(model_id = %model.id, coin = %decision.coin, "Hold signal, no action");
            return Ok(ExecutionOutcome::Held);
        }

        match plan_route(model.environment, model.automation_level) {
            RoutePlan::ApplySimulated => {
                let trade = self
                    .ledger
                    .apply_fill(
                        model,
                        &decision.coin,
                        decision.signal,
                        decision.quantity,
                        decision.reference_price,
                        decision.leverage,
                        None,
                    )
                    .await?;
                Ok(ExecutionOutcome::SimulatedFill { trade })
            }
            RoutePlan::AdvisoryOnly => {
                info!(
                    model_id = %model.id,
                    coin = %decision.coin,
                    signal = decision.signal.as_str(),
                    "Live/manual model: decision is advisory only"
                );
                Ok(ExecutionOutcome::Advisory {
                    decision: decision.clone(),
                })
            }
            RoutePlan::QueueForApproval => {
                let pending = PendingDecision {
                    id: Uuid::new_v4(),
                    model_id: model.id,
                    coin: decision.coin.clone(),
                    signal: decision.signal,
                    quantity: decision.quantity,
                    leverage: decision.leverage,
                    confidence: decision.confidence,
                    justification: decision.justification.clone(),
                    reference_price: decision.reference_price,
                    status: DecisionStatus::Pending,
                    rejection_reason: None,
                    created_at: Utc::now(),
                    actioned_at: None,
                };
                self.decisions.insert(&pending).await?;
                info!(
                    model_id = %model.id,
                    decision_id = %pending.id,
                    coin = %pending.coin,
                    "Decision queued for approval"
                );
                Ok(ExecutionOutcome::Queued { decision: pending })
            }
            RoutePlan::ExecuteLive => self.execute_live(model, decision, exchange).await,
        }
    }

    /// Execute a decision on the exchange. Shared by the fully-automated
    /// path and approval of a queued decision.
    pub async fn execute_live(
        &self,
        model: &Model,
        decision: &TradeDecision,
        exchange: Option<&dyn ExchangeApi>,
    ) -> Result<ExecutionOutcome> {
        let Some(exchange) = exchange else {
            let message = format!(
                "no {} credentials configured for model {}",
                model.exchange_environment.as_str(),
                model.id
            );
            self.record_execution_failure(model.id, &message).await;
            return Err(Error::MissingCredentials(message));
        };

        let symbol = self.symbol_for(&decision.coin);

        let info = match exchange.get_symbol_info(&symbol).await {
            Ok(info) => info,
            Err(e) => {
                self.record_execution_failure(model.id, &e.to_string()).await;
                return Err(e);
            }
        };

        // Truncate, never round up: a rounded-up quantity could exceed the
        // available balance.
        let quantity = truncate_to_step(decision.quantity, info.step_size);
        if quantity < info.min_qty || quantity <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "quantity {quantity} below exchange minimum {} for {symbol}",
                info.min_qty
            )));
        }
        let notional = quantity * decision.reference_price;
        if info.min_notional > Decimal::ZERO && notional < info.min_notional {
            return Err(Error::Validation(format!(
                "order value {notional} below exchange minimum notional {} for {symbol}",
                info.min_notional
            )));
        }

        let side = match decision.signal {
            Signal::BuyToEnter | Signal::BuyToExit => OrderSide::Buy,
            Signal::SellToEnter | Signal::SellToExit => OrderSide::Sell,
            Signal::Hold => return Ok(ExecutionOutcome::Held),
        };

        let fill = match exchange
            .place_market_order(&symbol, side, quantity, false)
            .await
        {
            Ok(fill) => fill,
            Err(e) => {
                // No automatic retry; the user re-triggers manually.
                error!(
                    model_id = %model.id,
                    symbol,
                    error = %e,
                    "Exchange order failed"
                );
                self.record_execution_failure(model.id, &e.to_string()).await;
                return Err(e);
            }
        };

        let fill_price = if fill.avg_price > Decimal::ZERO {
            fill.avg_price
        } else {
            decision.reference_price
        };
        let filled_qty = if fill.executed_qty > Decimal::ZERO {
            fill.executed_qty
        } else {
            quantity
        };

        let trade = self
            .ledger
            .apply_fill(
                model,
                &decision.coin,
                decision.signal,
                filled_qty,
                fill_price,
                decision.leverage,
                Some(fill.order_id.clone()),
            )
            .await?;

        info!(
            model_id = %model.id,
            symbol,
            order_id = %fill.order_id,
            %filled_qty,
            %fill_price,
            "Live order executed"
        );

        Ok(ExecutionOutcome::LiveFill {
            trade,
            exchange_order_id: fill.order_id,
        })
    }

    async fn record_execution_failure(&self, model_id: Uuid, message: &str) {
        if let Err(e) = self
            .incidents
            .record(
                model_id,
                IncidentKind::ExecutionError,
                IncidentSeverity::Danger,
                format!("Execution failed: {message}"),
            )
            .await
        {
            warn!(model_id = %model_id, error = %e, "Failed to record execution incident");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_never_reaches_the_exchange() {
        // Every automation level in simulation routes to the paper ledger.
        for automation in [
            AutomationLevel::Manual,
            AutomationLevel::SemiAutomated,
            AutomationLevel::FullyAutomated,
        ] {
            assert_eq!(
                plan_route(Environment::Simulation, automation),
                RoutePlan::ApplySimulated
            );
        }
    }

    #[test]
    fn live_routing_by_automation_level() {
        assert_eq!(
            plan_route(Environment::Live, AutomationLevel::Manual),
            RoutePlan::AdvisoryOnly
        );
        assert_eq!(
            plan_route(Environment::Live, AutomationLevel::SemiAutomated),
            RoutePlan::QueueForApproval
        );
        assert_eq!(
            plan_route(Environment::Live, AutomationLevel::FullyAutomated),
            RoutePlan::ExecuteLive
        );
    }
}
