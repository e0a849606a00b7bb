//! Executed trades, running positions, and portfolio snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::Error;

/// Direction of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

impl FromStr for TradeSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(Error::Validation(format!("unknown trade side '{other}'"))),
        }
    }
}

/// Immutable record of one executed action. Created exclusively by the order
/// router on a confirmed fill; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Trade {
    pub id: Uuid,
    pub model_id: Uuid,
    pub coin: String,
    pub action: TradeSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub leverage: Decimal,
    /// Realized P&L booked by this trade; `None` for pure entries.
    pub realized_pnl: Option<Decimal>,
    pub fee: Decimal,
    /// Exchange order id; `None` for simulated fills.
    pub exchange_order_id: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// Side of a running holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }
}

impl FromStr for PositionSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(PositionSide::Long),
            "short" => Ok(PositionSide::Short),
            other => Err(Error::Validation(format!(
                "unknown position side '{other}'"
            ))),
        }
    }
}

/// A running per-coin holding, maintained in the same transaction as each
/// executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub model_id: Uuid,
    pub coin: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub leverage: Decimal,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Cash reserved for this position (margin).
    pub fn cost_basis(&self) -> Decimal {
        if self.leverage > Decimal::ZERO {
            self.quantity * self.avg_entry_price / self.leverage
        } else {
            self.quantity * self.avg_entry_price
        }
    }

    /// Unrealized P&L at a mark price.
    pub fn unrealized_pnl(&self, mark_price: Decimal) -> Decimal {
        match self.side {
            PositionSide::Long => (mark_price - self.avg_entry_price) * self.quantity,
            PositionSide::Short => (self.avg_entry_price - mark_price) * self.quantity,
        }
    }
}

/// Point-in-time view of a model's portfolio, assembled from the database
/// inside the per-model execution lock.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PortfolioSnapshot {
    pub model_id: Uuid,
    pub cash: Decimal,
    pub initial_capital: Decimal,
    pub peak_value: Decimal,
    pub positions: Vec<Position>,
    /// Sum of position cost bases plus unrealized P&L at last known marks.
    pub position_value: Decimal,
    /// Realized P&L from trades executed today (UTC).
    pub realized_pnl_today: Decimal,
    /// Unrealized P&L across open positions at last known marks.
    pub unrealized_pnl: Decimal,
    /// Trades already executed today (UTC).
    pub trades_today: i64,
    pub taken_at: DateTime<Utc>,
}

impl PortfolioSnapshot {
    /// Total portfolio value: cash plus position value.
    pub fn total_value(&self) -> Decimal {
        self.cash + self.position_value
    }

    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn position_for(&self, coin: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.coin == coin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(side: PositionSide, qty: i64, entry: i64, leverage: i64) -> Position {
        Position {
            model_id: Uuid::new_v4(),
            coin: "BTC".to_string(),
            side,
            quantity: Decimal::new(qty, 0),
            avg_entry_price: Decimal::new(entry, 0),
            leverage: Decimal::new(leverage, 0),
            opened_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cost_basis_uses_leverage_as_margin_divisor() {
        let p = position(PositionSide::Long, 2, 100, 1);
        assert_eq!(p.cost_basis(), Decimal::new(200, 0));

        let leveraged = position(PositionSide::Long, 2, 100, 4);
        assert_eq!(leveraged.cost_basis(), Decimal::new(50, 0));
    }

    #[test]
    fn unrealized_pnl_signs() {
        let long = position(PositionSide::Long, 2, 100, 1);
        assert_eq!(long.unrealized_pnl(Decimal::new(110, 0)), Decimal::new(20, 0));

        let short = position(PositionSide::Short, 2, 100, 1);
        assert_eq!(
            short.unrealized_pnl(Decimal::new(110, 0)),
            Decimal::new(-20, 0)
        );
    }

    #[test]
    fn snapshot_totals() {
        let snapshot = PortfolioSnapshot {
            model_id: Uuid::new_v4(),
            cash: Decimal::new(7_500, 0),
            initial_capital: Decimal::new(10_000, 0),
            peak_value: Decimal::new(10_000, 0),
            positions: vec![position(PositionSide::Long, 1, 2_500, 1)],
            position_value: Decimal::new(2_500, 0),
            realized_pnl_today: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            trades_today: 1,
            taken_at: Utc::now(),
        };
        assert_eq!(snapshot.total_value(), Decimal::new(10_000, 0));
        assert_eq!(snapshot.open_positions(), 1);
        assert!(snapshot.position_for("BTC").is_some());
        assert!(snapshot.position_for("ETH").is_none());
    }
}
