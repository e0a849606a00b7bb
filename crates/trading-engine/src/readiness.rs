//! Readiness scoring: is a model good enough to graduate from simulation?
//!
//! Pure threshold comparisons over the accumulated trade ledger (trade
//! count, win rate, Sharpe over per-trade returns, drawdown over the
//! replayed equity curve) rolled into a weighted 0-100 score.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tradepilot_core::types::Trade;

/// Ledger-derived performance figures.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PerformanceSummary {
    pub trade_count: i64,
    /// Trades that booked realized P&L (position reductions/closes).
    pub closed_trades: i64,
    pub winning_trades: i64,
    /// Winners over closed trades, in [0, 1]. Zero with no closed trades.
    pub win_rate: f64,
    /// Gross profit over gross loss. Infinite streaks clamp to gross profit.
    pub profit_factor: f64,
    pub total_realized_pnl: Decimal,
    pub total_fees: Decimal,
    /// Mean over standard deviation of per-trade returns (realized P&L as a
    /// fraction of initial capital). Zero with fewer than two closed trades.
    pub sharpe_ratio: f64,
    /// Worst peak-to-trough decline of the replayed equity curve, percent.
    pub max_drawdown_pct: f64,
}

/// Replay the ledger into a performance summary.
pub fn summarize(trades: &[Trade], initial_capital: Decimal) -> PerformanceSummary {
    let closed: Vec<&Trade> = trades.iter().filter(|t| t.realized_pnl.is_some()).collect();
    let winning = closed
        .iter()
        .filter(|t| t.realized_pnl.unwrap_or(Decimal::ZERO) > Decimal::ZERO)
        .count() as i64;

    let total_realized: Decimal = closed
        .iter()
        .filter_map(|t| t.realized_pnl)
        .sum();
    let total_fees: Decimal = trades.iter().map(|t| t.fee).sum();

    let gross_profit: f64 = closed
        .iter()
        .filter_map(|t| t.realized_pnl)
        .filter(|p| *p > Decimal::ZERO)
        .map(|p| p.to_f64().unwrap_or(0.0))
        .sum();
    let gross_loss: f64 = closed
        .iter()
        .filter_map(|t| t.realized_pnl)
        .filter(|p| *p < Decimal::ZERO)
        .map(|p| -p.to_f64().unwrap_or(0.0))
        .sum();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        gross_profit
    };

    let win_rate = if closed.is_empty() {
        0.0
    } else {
        winning as f64 / closed.len() as f64
    };

    let capital = initial_capital.to_f64().unwrap_or(0.0);
    let returns: Vec<f64> = closed
        .iter()
        .filter_map(|t| t.realized_pnl)
        .map(|p| {
            if capital > 0.0 {
                p.to_f64().unwrap_or(0.0) / capital
            } else {
                0.0
            }
        })
        .collect();
    let sharpe_ratio = sharpe(&returns);

    let max_drawdown_pct = max_drawdown(trades, initial_capital);

    PerformanceSummary {
        trade_count: trades.len() as i64,
        closed_trades: closed.len() as i64,
        winning_trades: winning,
        win_rate,
        profit_factor,
        total_realized_pnl: total_realized,
        total_fees,
        sharpe_ratio,
        max_drawdown_pct,
    }
}

fn sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return 0.0;
    }
    mean / std_dev
}

fn max_drawdown(trades: &[Trade], initial_capital: Decimal) -> f64 {
    let mut equity = initial_capital.to_f64().unwrap_or(0.0);
    let mut peak = equity;
    let mut worst = 0.0f64;

    for trade in trades {
        let pnl = trade
            .realized_pnl
            .map(|p| p.to_f64().unwrap_or(0.0))
            .unwrap_or(0.0);
        let fee = trade.fee.to_f64().unwrap_or(0.0);
        equity += pnl - fee;
        if equity > peak {
            peak = equity;
        } else if peak > 0.0 {
            let drawdown = (peak - equity) / peak * 100.0;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst
}

/// Graduation minimums, compared against accumulated performance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadinessCriteria {
    pub min_trades: i64,
    pub min_win_rate: f64,
    pub min_sharpe: f64,
    pub max_drawdown_pct: f64,
}

impl Default for ReadinessCriteria {
    fn default() -> Self {
        Self {
            min_trades: 20,
            min_win_rate: 0.5,
            min_sharpe: 0.1,
            max_drawdown_pct: 20.0,
        }
    }
}

/// One criterion's comparison.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CriterionCheck {
    pub name: String,
    pub value: f64,
    pub required: f64,
    pub passed: bool,
}

/// Weighted readiness assessment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadinessReport {
    /// 0-100 weighted progress toward graduation.
    pub score: f64,
    /// True only when every criterion passes.
    pub ready: bool,
    pub checks: Vec<CriterionCheck>,
    pub summary: PerformanceSummary,
}

/// Compare a summary against graduation criteria.
pub fn assess(summary: PerformanceSummary, criteria: &ReadinessCriteria) -> ReadinessReport {
    let trades_component =
        ratio(summary.trade_count as f64, criteria.min_trades as f64);
    let win_rate_component = ratio(summary.win_rate, criteria.min_win_rate);
    let sharpe_component = ratio(summary.sharpe_ratio.max(0.0), criteria.min_sharpe);
    let drawdown_component = if summary.max_drawdown_pct <= criteria.max_drawdown_pct {
        1.0
    } else {
        criteria.max_drawdown_pct / summary.max_drawdown_pct
    };

    // Weights: activity 20, consistency 30, risk-adjusted return 30,
    // capital preservation 20.
    let score = trades_component * 20.0
        + win_rate_component * 30.0
        + sharpe_component * 30.0
        + drawdown_component * 20.0;

    let checks = vec![
        CriterionCheck {
            name: "trade_count".to_string(),
            value: summary.trade_count as f64,
            required: criteria.min_trades as f64,
            passed: summary.trade_count >= criteria.min_trades,
        },
        CriterionCheck {
            name: "win_rate".to_string(),
            value: summary.win_rate,
            required: criteria.min_win_rate,
            passed: summary.win_rate >= criteria.min_win_rate,
        },
        CriterionCheck {
            name: "sharpe_ratio".to_string(),
            value: summary.sharpe_ratio,
            required: criteria.min_sharpe,
            passed: summary.sharpe_ratio >= criteria.min_sharpe,
        },
        CriterionCheck {
            name: "max_drawdown_pct".to_string(),
            value: summary.max_drawdown_pct,
            required: criteria.max_drawdown_pct,
            passed: summary.max_drawdown_pct <= criteria.max_drawdown_pct,
        },
    ];

    let ready = checks.iter().all(|c| c.passed);

    ReadinessReport {
        score,
        ready,
        checks,
        summary,
    }
}

fn ratio(value: f64, required: f64) -> f64 {
    if required <= 0.0 {
        1.0
    } else {
        (value / required).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tradepilot_core::types::TradeSide;
    use uuid::Uuid;

    fn trade(realized: Option<i64>) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            model_id: Uuid::new_v4(),
            coin: "BTC".to_string(),
            action: TradeSide::Sell,
            quantity: Decimal::ONE,
            price: Decimal::new(100, 0),
            leverage: Decimal::ONE,
            realized_pnl: realized.map(|r| Decimal::new(r, 0)),
            fee: Decimal::ZERO,
            exchange_order_id: None,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn empty_ledger_summarizes_flat() {
        let summary = summarize(&[], Decimal::new(10_000, 0));
        assert_eq!(summary.trade_count, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.max_drawdown_pct, 0.0);
    }

    #[test]
    fn win_rate_counts_closed_trades_only() {
        let trades = vec![
            trade(None), // entry, no realized P&L
            trade(Some(50)),
            trade(Some(-20)),
            trade(Some(30)),
        ];
        let summary = summarize(&trades, Decimal::new(10_000, 0));
        assert_eq!(summary.closed_trades, 3);
        assert_eq!(summary.winning_trades, 2);
        assert!((summary.win_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.total_realized_pnl, Decimal::new(60, 0));
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        // +100 (peak 10100), -200 (trough 9900): drawdown 200/10100.
        let trades = vec![trade(Some(100)), trade(Some(-200))];
        let summary = summarize(&trades, Decimal::new(10_000, 0));
        let expected = 200.0 / 10_100.0 * 100.0;
        assert!((summary.max_drawdown_pct - expected).abs() < 1e-9);
    }

    #[test]
    fn not_ready_with_thin_ledger() {
        let trades = vec![trade(Some(10)), trade(Some(12))];
        let summary = summarize(&trades, Decimal::new(10_000, 0));
        let report = assess(summary, &ReadinessCriteria::default());
        assert!(!report.ready);
        let trade_check = report
            .checks
            .iter()
            .find(|c| c.name == "trade_count")
            .unwrap();
        assert!(!trade_check.passed);
        assert!(report.score < 100.0);
    }

    #[test]
    fn ready_when_every_criterion_passes() {
        // 25 profitable-heavy closes with steady wins.
        let mut trades = Vec::new();
        for i in 0..25 {
            trades.push(trade(Some(if i % 5 == 0 { -5 } else { 20 })));
        }
        let summary = summarize(&trades, Decimal::new(10_000, 0));
        let report = assess(summary, &ReadinessCriteria::default());
        assert!(report.ready, "checks: {:?}", report.checks);
        assert!(report.score > 99.0);
    }

    #[test]
    fn score_is_bounded() {
        let trades: Vec<Trade> = (0..100).map(|_| trade(Some(50))).collect();
        let summary = summarize(&trades, Decimal::new(10_000, 0));
        let report = assess(summary, &ReadinessCriteria::default());
        assert!(report.score <= 100.0);
    }
}
