//! Ledger accounting for executed fills.
//!
//! The math is pure ([`apply_signal`]) so position transitions are testable
//! without a database. [`LedgerWriter`] wraps one fill in a single
//! transaction spanning the trade insert, the position upsert and the
//! model's cash/peak update, so a half-applied fill can never be observed
//! by the next risk evaluation.
//!
//! Accounting model: an entry reserves margin (`qty * price / leverage`)
//! from cash; an exit returns the margin plus realized P&L minus fees.
//! Cost bases plus cash therefore always equal initial capital plus realized
//! P&L minus fees.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use tradepilot_core::db::TradeRepository;
use tradepilot_core::types::{
    Model, Position, PositionSide, Signal, Trade, TradeSide,
};
use tradepilot_core::{Error, Result};

/// Net effect of one fill on a position and the cash balance.
#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    /// Post-fill position; `None` when the holding is fully closed.
    pub position: Option<Position>,
    /// P&L realized by this fill (gross of fees); `None` for entries.
    pub realized_pnl: Option<Decimal>,
    /// Fee charged on the fill notional.
    pub fee: Decimal,
    /// Signed change to the model's cash balance (fee included).
    pub cash_delta: Decimal,
    /// Ledger action recorded for the trade row.
    pub action: TradeSide,
}

fn entry_side(signal: Signal) -> Option<PositionSide> {
    match signal {
        Signal::BuyToEnter => Some(PositionSide::Long),
        Signal::SellToEnter => Some(PositionSide::Short),
        _ => None,
    }
}

fn exit_side(signal: Signal) -> Option<PositionSide> {
    match signal {
        Signal::SellToExit => Some(PositionSide::Long),
        Signal::BuyToExit => Some(PositionSide::Short),
        _ => None,
    }
}

fn trade_action(signal: Signal) -> Result<TradeSide> {
    match signal {
        Signal::BuyToEnter | Signal::BuyToExit => Ok(TradeSide::Buy),
        Signal::SellToEnter | Signal::SellToExit => Ok(TradeSide::Sell),
        Signal::Hold => Err(Error::Validation(
            "hold signals do not produce fills".to_string(),
        )),
    }
}

/// Apply a fill to the (possibly absent) existing position. Pure.
#[allow(clippy::too_many_arguments)]
pub fn apply_signal(
    existing: Option<&Position>,
    model_id: Uuid,
    coin: &str,
    signal: Signal,
    quantity: Decimal,
    price: Decimal,
    leverage: Decimal,
    fee_rate: Decimal,
) -> Result<FillOutcome> {
    let action = trade_action(signal)?;
    if quantity <= Decimal::ZERO {
        return Err(Error::Validation("quantity must be positive".to_string()));
    }
    if price <= Decimal::ZERO {
        return Err(Error::Validation("price must be positive".to_string()));
    }
    let leverage = if leverage > Decimal::ZERO {
        leverage
    } else {
        Decimal::ONE
    };

    let now = Utc::now();
    let fee = quantity * price * fee_rate;

    if let Some(side) = entry_side(signal) {
        if let Some(position) = existing {
            if position.side != side {
                return Err(Error::Validation(format!(
                    "{coin} already has an open {} position; close it before entering {}",
                    position.side.as_str(),
                    side.as_str()
                )));
            }
            // Add to the holding, averaging the entry price.
            let new_quantity = position.quantity + quantity;
            let avg_entry_price = (position.quantity * position.avg_entry_price
                + quantity * price)
                / new_quantity;
            let margin = quantity * price / leverage;
            return Ok(FillOutcome {
                position: Some(Position {
                    quantity: new_quantity,
                    avg_entry_price,
                    updated_at: now,
                    ..position.clone()
                }),
                realized_pnl: None,
                fee,
                cash_delta: -(margin + fee),
                action,
            });
        }

        let margin = quantity * price / leverage;
        return Ok(FillOutcome {
            position: Some(Position {
                model_id,
                coin: coin.to_string(),
                side,
                quantity,
                avg_entry_price: price,
                leverage,
                opened_at: now,
                updated_at: now,
            }),
            realized_pnl: None,
            fee,
            cash_delta: -(margin + fee),
            action,
        });
    }

    // Exit path.
    let side = exit_side(signal).expect("non-hold signal is entry or exit");
    let Some(position) = existing else {
        return Err(Error::Validation(format!(
            "no open position in {coin} to exit"
        )));
    };
    if position.side != side {
        return Err(Error::Validation(format!(
            "{coin} holding is {}, not {}; wrong exit signal",
            position.side.as_str(),
            side.as_str()
        )));
    }
    if quantity > position.quantity {
        return Err(Error::Validation(format!(
            "exit quantity {quantity} exceeds held quantity {} in {coin}",
            position.quantity
        )));
    }

    let realized = match side {
        PositionSide::Long => (price - position.avg_entry_price) * quantity,
        PositionSide::Short => (position.avg_entry_price - price) * quantity,
    };
    let margin_returned = quantity * position.avg_entry_price / position.leverage;
    let remaining = position.quantity - quantity;

    let new_position = if remaining > Decimal::ZERO {
        Some(Position {
            quantity: remaining,
            updated_at: now,
            ..position.clone()
        })
    } else {
        None
    };

    Ok(FillOutcome {
        position: new_position,
        realized_pnl: Some(realized),
        fee,
        cash_delta: margin_returned + realized - fee,
        action,
    })
}

/// Applies fills transactionally.
pub struct LedgerWriter {
    pool: PgPool,
    fee_rate: Decimal,
}

impl LedgerWriter {
    pub fn new(pool: PgPool, fee_rate: Decimal) -> Self {
        Self { pool, fee_rate }
    }

    /// Persist one fill: trade row, position row, cash and peak, all in one
    /// transaction. The caller holds the model's execution lock.
    pub async fn apply_fill(
        &self,
        model: &Model,
        coin: &str,
        signal: Signal,
        quantity: Decimal,
        price: Decimal,
        leverage: Decimal,
        exchange_order_id: Option<String>,
    ) -> Result<Trade> {
        let mut tx = self.pool.begin().await?;

        let existing =
            TradeRepository::get_position_for_update(&mut tx, model.id, coin).await?;
        let outcome = apply_signal(
            existing.as_ref(),
            model.id,
            coin,
            signal,
            quantity,
            price,
            leverage,
            self.fee_rate,
        )?;

        let new_cash = model.cash_balance + outcome.cash_delta;
        if new_cash < Decimal::ZERO {
            return Err(Error::Validation(format!(
                "insufficient cash: balance {} cannot absorb {}",
                model.cash_balance, -outcome.cash_delta
            )));
        }

        let trade = Trade {
            id: Uuid::new_v4(),
            model_id: model.id,
            coin: coin.to_string(),
            action: outcome.action,
            quantity,
            price,
            leverage,
            realized_pnl: outcome.realized_pnl,
            fee: outcome.fee,
            exchange_order_id,
            executed_at: Utc::now(),
        };
        TradeRepository::insert_trade(&mut tx, &trade).await?;

        match &outcome.position {
            Some(position) => TradeRepository::upsert_position(&mut tx, position).await?,
            None => TradeRepository::delete_position(&mut tx, model.id, coin).await?,
        }

        let cost_basis = TradeRepository::sum_cost_basis(&mut tx, model.id).await?;
        TradeRepository::update_cash_and_peak(&mut tx, model.id, new_cash, new_cash + cost_basis)
            .await?;

        tx.commit().await?;

        info!(
            model_id = %model.id,
            coin,
            signal = signal.as_str(),
            %quantity,
            %price,
            realized_pnl = ?outcome.realized_pnl,
            "Fill applied to ledger"
        );

        Ok(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BTC: &str = "BTC";

    fn model_id() -> Uuid {
        Uuid::new_v4()
    }

    fn open_long(qty: i64, entry: i64) -> Position {
        Position {
            model_id: model_id(),
            coin: BTC.to_string(),
            side: PositionSide::Long,
            quantity: Decimal::new(qty, 0),
            avg_entry_price: Decimal::new(entry, 0),
            leverage: Decimal::ONE,
            opened_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn entry_reserves_margin() {
        let outcome = apply_signal(
            None,
            model_id(),
            BTC,
            Signal::BuyToEnter,
            Decimal::new(2, 0),
            Decimal::new(100, 0),
            Decimal::ONE,
            Decimal::ZERO,
        )
        .unwrap();

        assert_eq!(outcome.cash_delta, Decimal::new(-200, 0));
        assert_eq!(outcome.action, TradeSide::Buy);
        assert!(outcome.realized_pnl.is_none());
        let position = outcome.position.unwrap();
        assert_eq!(position.quantity, Decimal::new(2, 0));
        assert_eq!(position.side, PositionSide::Long);
    }

    #[test]
    fn leveraged_entry_reserves_fraction() {
        let outcome = apply_signal(
            None,
            model_id(),
            BTC,
            Signal::BuyToEnter,
            Decimal::new(2, 0),
            Decimal::new(100, 0),
            Decimal::new(4, 0),
            Decimal::ZERO,
        )
        .unwrap();
        assert_eq!(outcome.cash_delta, Decimal::new(-50, 0));
    }

    #[test]
    fn round_trip_at_same_price_realizes_zero() {
        // Buy X at P, sell X at P: flat P&L, position gone.
        let entry = apply_signal(
            None,
            model_id(),
            BTC,
            Signal::BuyToEnter,
            Decimal::new(3, 0),
            Decimal::new(250, 0),
            Decimal::ONE,
            Decimal::ZERO,
        )
        .unwrap();
        let position = entry.position.unwrap();

        let exit = apply_signal(
            Some(&position),
            position.model_id,
            BTC,
            Signal::SellToExit,
            Decimal::new(3, 0),
            Decimal::new(250, 0),
            Decimal::ONE,
            Decimal::ZERO,
        )
        .unwrap();

        assert_eq!(exit.realized_pnl, Some(Decimal::ZERO));
        assert!(exit.position.is_none());
        // Cash is exactly restored.
        assert_eq!(entry.cash_delta + exit.cash_delta, Decimal::ZERO);
    }

    #[test]
    fn round_trip_with_fees_costs_two_fees() {
        let fee_rate = Decimal::new(1, 3); // 10 bps
        let entry = apply_signal(
            None,
            model_id(),
            BTC,
            Signal::BuyToEnter,
            Decimal::ONE,
            Decimal::new(1_000, 0),
            Decimal::ONE,
            fee_rate,
        )
        .unwrap();
        let position = entry.position.unwrap();
        let exit = apply_signal(
            Some(&position),
            position.model_id,
            BTC,
            Signal::SellToExit,
            Decimal::ONE,
            Decimal::new(1_000, 0),
            Decimal::ONE,
            fee_rate,
        )
        .unwrap();

        // 1 each way on a $1,000 notional at 10 bps.
        assert_eq!(entry.cash_delta + exit.cash_delta, Decimal::new(-2, 0));
        assert_eq!(exit.realized_pnl, Some(Decimal::ZERO));
    }

    #[test]
    fn long_exit_realizes_price_move() {
        let position = open_long(2, 100);
        let outcome = apply_signal(
            Some(&position),
            position.model_id,
            BTC,
            Signal::SellToExit,
            Decimal::new(2, 0),
            Decimal::new(130, 0),
            Decimal::ONE,
            Decimal::ZERO,
        )
        .unwrap();
        assert_eq!(outcome.realized_pnl, Some(Decimal::new(60, 0)));
        // Margin (200) plus profit (60).
        assert_eq!(outcome.cash_delta, Decimal::new(260, 0));
    }

    #[test]
    fn short_round_trip_signs() {
        let entry = apply_signal(
            None,
            model_id(),
            BTC,
            Signal::SellToEnter,
            Decimal::new(2, 0),
            Decimal::new(100, 0),
            Decimal::ONE,
            Decimal::ZERO,
        )
        .unwrap();
        let position = entry.position.unwrap();
        assert_eq!(position.side, PositionSide::Short);
        assert_eq!(entry.action, TradeSide::Sell);

        // Price drops: short profits.
        let exit = apply_signal(
            Some(&position),
            position.model_id,
            BTC,
            Signal::BuyToExit,
            Decimal::new(2, 0),
            Decimal::new(80, 0),
            Decimal::ONE,
            Decimal::ZERO,
        )
        .unwrap();
        assert_eq!(exit.realized_pnl, Some(Decimal::new(40, 0)));
        assert_eq!(exit.action, TradeSide::Buy);
    }

    #[test]
    fn partial_exit_keeps_remainder() {
        let position = open_long(5, 100);
        let outcome = apply_signal(
            Some(&position),
            position.model_id,
            BTC,
            Signal::SellToExit,
            Decimal::new(2, 0),
            Decimal::new(110, 0),
            Decimal::ONE,
            Decimal::ZERO,
        )
        .unwrap();
        let remaining = outcome.position.unwrap();
        assert_eq!(remaining.quantity, Decimal::new(3, 0));
        assert_eq!(remaining.avg_entry_price, Decimal::new(100, 0));
        assert_eq!(outcome.realized_pnl, Some(Decimal::new(20, 0)));
    }

    #[test]
    fn reentry_averages_entry_price() {
        let position = open_long(1, 100);
        let outcome = apply_signal(
            Some(&position),
            position.model_id,
            BTC,
            Signal::BuyToEnter,
            Decimal::new(1, 0),
            Decimal::new(200, 0),
            Decimal::ONE,
            Decimal::ZERO,
        )
        .unwrap();
        let position = outcome.position.unwrap();
        assert_eq!(position.quantity, Decimal::new(2, 0));
        assert_eq!(position.avg_entry_price, Decimal::new(150, 0));
    }

    #[test]
    fn oversized_exit_is_rejected() {
        let position = open_long(1, 100);
        let result = apply_signal(
            Some(&position),
            position.model_id,
            BTC,
            Signal::SellToExit,
            Decimal::new(2, 0),
            Decimal::new(100, 0),
            Decimal::ONE,
            Decimal::ZERO,
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn opposite_side_entry_is_rejected() {
        let position = open_long(1, 100);
        let result = apply_signal(
            Some(&position),
            position.model_id,
            BTC,
            Signal::SellToEnter,
            Decimal::ONE,
            Decimal::new(100, 0),
            Decimal::ONE,
            Decimal::ZERO,
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn exit_without_position_is_rejected() {
        let result = apply_signal(
            None,
            model_id(),
            BTC,
            Signal::SellToExit,
            Decimal::ONE,
            Decimal::new(100, 0),
            Decimal::ONE,
            Decimal::ZERO,
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn hold_never_fills() {
        let result = apply_signal(
            None,
            model_id(),
            BTC,
            Signal::Hold,
            Decimal::ONE,
            Decimal::new(100, 0),
            Decimal::ONE,
            Decimal::ZERO,
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
