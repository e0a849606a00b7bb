//! Threshold-based risk evaluation.
//!
//! The evaluator is pure: it reads a portfolio snapshot, the model's risk
//! settings, and (optionally) a proposed order, and produces a verdict with
//! one classified reading per metric. All I/O (snapshot assembly, incident
//! persistence) happens in the caller, inside the per-model execution lock.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tradepilot_core::types::{PortfolioSnapshot, RiskSettings, Signal};

/// The five gated metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskMetric {
    PositionSize,
    DailyLoss,
    OpenPositions,
    CashReserve,
    DailyTrades,
}

impl RiskMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskMetric::PositionSize => "position_size",
            RiskMetric::DailyLoss => "daily_loss",
            RiskMetric::OpenPositions => "open_positions",
            RiskMetric::CashReserve => "cash_reserve",
            RiskMetric::DailyTrades => "daily_trades",
        }
    }

    /// Hard limits reject on danger; soft limits can be downgraded to
    /// advisory via [`RiskThresholds::advisory_soft_limits`].
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            RiskMetric::DailyLoss | RiskMetric::CashReserve | RiskMetric::DailyTrades
        )
    }
}

/// Three-tier classification of a metric's usage against its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Ok,
    Warning,
    Danger,
}

/// One classified metric.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetricReading {
    pub metric: RiskMetric,
    pub status: MetricStatus,
    /// Usage ratio against the configured limit (1.0 = at the limit).
    pub usage: Decimal,
    pub current: Decimal,
    pub limit: Decimal,
    pub hard: bool,
}

/// Order under evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProposedOrder {
    pub coin: String,
    pub signal: Signal,
    pub quantity: Decimal,
    pub price: Decimal,
    pub leverage: Decimal,
}

/// Overall verdict with per-metric readings for display.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RiskVerdict {
    pub accept: bool,
    /// Danger states on hard limits (always rejecting).
    pub hard_violations: u32,
    /// Danger states on soft limits (rejecting unless advisory).
    pub soft_violations: u32,
    pub readings: Vec<MetricReading>,
}

impl RiskVerdict {
    pub fn reading(&self, metric: RiskMetric) -> Option<&MetricReading> {
        self.readings.iter().find(|r| r.metric == metric)
    }
}

/// Classification thresholds, expressed as fractions of the limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Usage at or above this fraction of the limit is a warning.
    pub warning_ratio: Decimal,
    /// Usage at or above this fraction of the limit is danger.
    pub danger_ratio: Decimal,
    /// When set, soft-limit danger states downgrade the reject to advisory.
    pub advisory_soft_limits: bool,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            warning_ratio: Decimal::new(8, 1), // 80%
            danger_ratio: Decimal::ONE,        // 100%
            advisory_soft_limits: false,
        }
    }
}

/// Pure risk evaluator.
#[derive(Debug, Clone, Default)]
pub struct RiskEvaluator {
    thresholds: RiskThresholds,
}

impl RiskEvaluator {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate the portfolio, optionally projecting a proposed order.
    /// Without a proposal this reports current standing (the dashboard's
    /// risk-status view).
    pub fn evaluate(
        &self,
        snapshot: &PortfolioSnapshot,
        settings: &RiskSettings,
        proposed: Option<&ProposedOrder>,
    ) -> RiskVerdict {
        let readings = vec![
            self.position_size(snapshot, settings, proposed),
            self.daily_loss(snapshot, settings),
            self.open_positions(snapshot, settings, proposed),
            self.cash_reserve(snapshot, settings, proposed),
            self.daily_trades(snapshot, settings),
        ];

        let hard_violations = readings
            .iter()
            .filter(|r| r.hard && r.status == MetricStatus::Danger)
            .count() as u32;
        let soft_violations = readings
            .iter()
            .filter(|r| !r.hard && r.status == MetricStatus::Danger)
            .count() as u32;

        let accept = hard_violations == 0
            && (self.thresholds.advisory_soft_limits || soft_violations == 0);

        RiskVerdict {
            accept,
            hard_violations,
            soft_violations,
            readings,
        }
    }

    fn classify(&self, usage: Decimal) -> MetricStatus {
        if usage >= self.thresholds.danger_ratio {
            MetricStatus::Danger
        } else if usage >= self.thresholds.warning_ratio {
            MetricStatus::Warning
        } else {
            MetricStatus::Ok
        }
    }

    fn reading(
        &self,
        metric: RiskMetric,
        usage: Decimal,
        current: Decimal,
        limit: Decimal,
    ) -> MetricReading {
        MetricReading {
            metric,
            status: self.classify(usage),
            usage,
            current,
            limit,
            hard: metric.is_hard(),
        }
    }

    /// Projected value of the touched position against the max position
    /// size %. Without a proposal, the largest existing position is scored.
    fn position_size(
        &self,
        snapshot: &PortfolioSnapshot,
        settings: &RiskSettings,
        proposed: Option<&ProposedOrder>,
    ) -> MetricReading {
        let total = snapshot.total_value();
        let projected_notional = match proposed {
            Some(order) => {
                let existing = snapshot
                    .position_for(&order.coin)
                    .map(|p| p.quantity * p.avg_entry_price)
                    .unwrap_or(Decimal::ZERO);
                let delta = order.quantity * order.price;
                if order.signal.is_exit() {
                    (existing - delta).max(Decimal::ZERO)
                } else if order.signal.is_entry() {
                    existing + delta
                } else {
                    existing
                }
            }
            None => snapshot
                .positions
                .iter()
                .map(|p| p.quantity * p.avg_entry_price)
                .max()
                .unwrap_or(Decimal::ZERO),
        };

        let pct = if total > Decimal::ZERO {
            projected_notional / total * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        let usage = if settings.max_position_size_pct > Decimal::ZERO {
            pct / settings.max_position_size_pct
        } else {
            Decimal::ZERO
        };
        self.reading(RiskMetric::PositionSize, usage, pct, settings.max_position_size_pct)
    }

    /// Today's realized + unrealized loss against max daily loss % of
    /// initial capital. Profit reads as zero usage.
    fn daily_loss(&self, snapshot: &PortfolioSnapshot, settings: &RiskSettings) -> MetricReading {
        let pnl_today = snapshot.realized_pnl_today + snapshot.unrealized_pnl;
        let loss = (-pnl_today).max(Decimal::ZERO);
        let loss_pct = if snapshot.initial_capital > Decimal::ZERO {
            loss / snapshot.initial_capital * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        let usage = if settings.max_daily_loss_pct > Decimal::ZERO {
            loss_pct / settings.max_daily_loss_pct
        } else {
            Decimal::ZERO
        };
        self.reading(RiskMetric::DailyLoss, usage, loss_pct, settings.max_daily_loss_pct)
    }

    /// Distinct non-zero holdings after the trade against max open positions.
    fn open_positions(
        &self,
        snapshot: &PortfolioSnapshot,
        settings: &RiskSettings,
        proposed: Option<&ProposedOrder>,
    ) -> MetricReading {
        let mut projected = snapshot.open_positions() as i64;
        if let Some(order) = proposed {
            let existing = snapshot.position_for(&order.coin);
            if order.signal.is_entry() && existing.is_none() {
                projected += 1;
            } else if order.signal.is_exit() {
                if let Some(position) = existing {
                    if order.quantity >= position.quantity {
                        projected -= 1;
                    }
                }
            }
        }
        let projected = projected.max(0);

        let usage = if settings.max_open_positions > 0 {
            Decimal::from(projected) / Decimal::from(settings.max_open_positions)
        } else {
            Decimal::ZERO
        };
        self.reading(
            RiskMetric::OpenPositions,
            usage,
            Decimal::from(projected),
            Decimal::from(settings.max_open_positions),
        )
    }

    /// Remaining cash after the trade against the minimum reserve. Inverse
    /// direction: usage is min-required over projected, so danger fires when
    /// cash falls to or below the configured floor.
    fn cash_reserve(
        &self,
        snapshot: &PortfolioSnapshot,
        settings: &RiskSettings,
        proposed: Option<&ProposedOrder>,
    ) -> MetricReading {
        let mut projected_cash = snapshot.cash;
        if let Some(order) = proposed {
            let leverage = if order.leverage > Decimal::ZERO {
                order.leverage
            } else {
                Decimal::ONE
            };
            let margin = order.quantity * order.price / leverage;
            if order.signal.is_entry() {
                projected_cash -= margin;
            } else if order.signal.is_exit() {
                projected_cash += margin;
            }
        }

        let total = snapshot.total_value();
        let cash_pct = if total > Decimal::ZERO {
            projected_cash / total * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let usage = if settings.min_cash_reserve_pct <= Decimal::ZERO {
            Decimal::ZERO
        } else if cash_pct <= Decimal::ZERO {
            // No cash left at all: saturate past danger.
            self.thresholds.danger_ratio + Decimal::ONE
        } else {
            settings.min_cash_reserve_pct / cash_pct
        };
        self.reading(RiskMetric::CashReserve, usage, cash_pct, settings.min_cash_reserve_pct)
    }

    /// Trades already executed today against the daily cap. The (N+1)th
    /// proposal with a cap of N is the first to reach usage 1.0.
    fn daily_trades(&self, snapshot: &PortfolioSnapshot, settings: &RiskSettings) -> MetricReading {
        let usage = if settings.max_daily_trades > 0 {
            Decimal::from(snapshot.trades_today) / Decimal::from(settings.max_daily_trades)
        } else {
            Decimal::ZERO
        };
        self.reading(
            RiskMetric::DailyTrades,
            usage,
            Decimal::from(snapshot.trades_today),
            Decimal::from(settings.max_daily_trades),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tradepilot_core::types::{Position, PositionSide};
    use uuid::Uuid;

    fn snapshot(cash: i64, positions: Vec<Position>) -> PortfolioSnapshot {
        let position_value: Decimal = positions
            .iter()
            .map(|p| p.quantity * p.avg_entry_price)
            .sum();
        PortfolioSnapshot {
            model_id: Uuid::new_v4(),
            cash: Decimal::new(cash, 0),
            initial_capital: Decimal::new(10_000, 0),
            peak_value: Decimal::new(10_000, 0),
            positions,
            position_value,
            realized_pnl_today: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            trades_today: 0,
            taken_at: Utc::now(),
        }
    }

    fn position(coin: &str, qty: i64, entry: i64) -> Position {
        Position {
            model_id: Uuid::new_v4(),
            coin: coin.to_string(),
            side: PositionSide::Long,
            quantity: Decimal::new(qty, 0),
            avg_entry_price: Decimal::new(entry, 0),
            leverage: Decimal::ONE,
            opened_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn buy(coin: &str, qty: Decimal, price: i64) -> ProposedOrder {
        ProposedOrder {
            coin: coin.to_string(),
            signal: Signal::BuyToEnter,
            quantity: qty,
            price: Decimal::new(price, 0),
            leverage: Decimal::ONE,
        }
    }

    #[test]
    fn oversized_position_is_danger_and_rejected() {
        // Limit 20%, portfolio $10,000, proposed $2,500 position -> 25%.
        let evaluator = RiskEvaluator::default();
        let snapshot = snapshot(10_000, vec![]);
        let settings = RiskSettings::default();
        let order = buy("BTC", Decimal::new(1, 0), 2_500);

        let verdict = evaluator.evaluate(&snapshot, &settings, Some(&order));
        let reading = verdict.reading(RiskMetric::PositionSize).unwrap();
        assert_eq!(reading.status, MetricStatus::Danger);
        assert!(!verdict.accept);
        assert_eq!(verdict.soft_violations, 1);
        assert_eq!(verdict.hard_violations, 0);
    }

    #[test]
    fn position_at_warning_band() {
        // 17% of portfolio against a 20% limit -> 85% usage -> warning.
        let evaluator = RiskEvaluator::default();
        let snapshot = snapshot(10_000, vec![]);
        let settings = RiskSettings::default();
        let order = buy("BTC", Decimal::new(1, 0), 1_700);

        let verdict = evaluator.evaluate(&snapshot, &settings, Some(&order));
        let reading = verdict.reading(RiskMetric::PositionSize).unwrap();
        assert_eq!(reading.status, MetricStatus::Warning);
        assert!(verdict.accept);
    }

    #[test]
    fn advisory_soft_limits_accept_despite_danger() {
        let evaluator = RiskEvaluator::new(RiskThresholds {
            advisory_soft_limits: true,
            ..Default::default()
        });
        let snapshot = snapshot(10_000, vec![]);
        let settings = RiskSettings::default();
        let order = buy("BTC", Decimal::new(1, 0), 2_500);

        let verdict = evaluator.evaluate(&snapshot, &settings, Some(&order));
        assert_eq!(verdict.soft_violations, 1);
        assert!(verdict.accept);
    }

    #[test]
    fn fourth_trade_of_day_hits_daily_cap() {
        let evaluator = RiskEvaluator::default();
        let mut snap = snapshot(10_000, vec![]);
        let settings = RiskSettings {
            max_daily_trades: 3,
            ..Default::default()
        };

        // Three trades already executed today: the next proposal is the 4th.
        snap.trades_today = 3;
        let order = buy("BTC", Decimal::new(1, 0), 100);
        let verdict = evaluator.evaluate(&snap, &settings, Some(&order));
        let reading = verdict.reading(RiskMetric::DailyTrades).unwrap();
        assert_eq!(reading.status, MetricStatus::Danger);
        assert!(!verdict.accept);
        assert_eq!(verdict.hard_violations, 1);

        // With only two executed, the 3rd proposal passes.
        snap.trades_today = 2;
        let verdict = evaluator.evaluate(&snap, &settings, Some(&order));
        let reading = verdict.reading(RiskMetric::DailyTrades).unwrap();
        assert_eq!(reading.status, MetricStatus::Ok);
        assert!(verdict.accept);
    }

    #[test]
    fn cash_reserve_inverse_direction() {
        let evaluator = RiskEvaluator::default();
        // $1,000 cash + $9,000 positions; min reserve 10% of $10,000 total.
        let snap = snapshot(1_000, vec![position("BTC", 9, 1_000)]);
        let settings = RiskSettings::default();

        // Spending $600 more pushes cash to 4% -> below the 10% floor.
        let order = buy("ETH", Decimal::new(6, 0), 100);
        let verdict = evaluator.evaluate(&snap, &settings, Some(&order));
        let reading = verdict.reading(RiskMetric::CashReserve).unwrap();
        assert_eq!(reading.status, MetricStatus::Danger);
        assert!(!verdict.accept);
        assert!(reading.hard);
    }

    #[test]
    fn cash_reserve_ok_with_ample_cash() {
        let evaluator = RiskEvaluator::default();
        let snap = snapshot(10_000, vec![]);
        let settings = RiskSettings::default();

        let order = buy("BTC", Decimal::new(1, 0), 1_000);
        let verdict = evaluator.evaluate(&snap, &settings, Some(&order));
        let reading = verdict.reading(RiskMetric::CashReserve).unwrap();
        assert_eq!(reading.status, MetricStatus::Ok);
    }

    #[test]
    fn daily_loss_counts_losses_only() {
        let evaluator = RiskEvaluator::default();
        let settings = RiskSettings::default(); // max daily loss 5% of $10k = $500

        let mut snap = snapshot(10_000, vec![]);
        snap.realized_pnl_today = Decimal::new(-600, 0);
        let verdict = evaluator.evaluate(&snap, &settings, None);
        let reading = verdict.reading(RiskMetric::DailyLoss).unwrap();
        assert_eq!(reading.status, MetricStatus::Danger);

        snap.realized_pnl_today = Decimal::new(600, 0);
        let verdict = evaluator.evaluate(&snap, &settings, None);
        let reading = verdict.reading(RiskMetric::DailyLoss).unwrap();
        assert_eq!(reading.status, MetricStatus::Ok);
        assert_eq!(reading.current, Decimal::ZERO);
    }

    #[test]
    fn open_positions_projection() {
        let evaluator = RiskEvaluator::default();
        let settings = RiskSettings {
            max_open_positions: 2,
            ..Default::default()
        };
        let snap = snapshot(8_000, vec![position("BTC", 1, 1_000), position("ETH", 1, 1_000)]);

        // Entering a third coin breaches the cap of two.
        let order = buy("SOL", Decimal::new(1, 0), 100);
        let verdict = evaluator.evaluate(&snap, &settings, Some(&order));
        let reading = verdict.reading(RiskMetric::OpenPositions).unwrap();
        assert_eq!(reading.status, MetricStatus::Danger);

        // Adding to an existing holding does not change the count.
        let order = buy("BTC", Decimal::new(1, 0), 100);
        let verdict = evaluator.evaluate(&snap, &settings, Some(&order));
        let reading = verdict.reading(RiskMetric::OpenPositions).unwrap();
        assert_eq!(reading.current, Decimal::new(2, 0));
    }

    #[test]
    fn status_view_without_proposal() {
        let evaluator = RiskEvaluator::default();
        let snap = snapshot(7_500, vec![position("BTC", 1, 2_500)]);
        let settings = RiskSettings::default();

        let verdict = evaluator.evaluate(&snap, &settings, None);
        assert_eq!(verdict.readings.len(), 5);
        // Existing 25% position against a 20% limit shows danger on the
        // status view but hard violations stay zero.
        let reading = verdict.reading(RiskMetric::PositionSize).unwrap();
        assert_eq!(reading.status, MetricStatus::Danger);
        assert_eq!(verdict.hard_violations, 0);
    }
}
