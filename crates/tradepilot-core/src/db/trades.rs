//! Database operations for the trade ledger and running positions.
//!
//! Fill persistence is transactional: the trade insert, the position upsert
//! and the model's cash/peak update always commit together (or not at all),
//! so the next risk evaluation can never read a half-applied fill.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::types::{Model, PortfolioSnapshot, Position, Trade};
use crate::Result;

/// Repository for trades and positions.
pub struct TradeRepository {
    pool: PgPool,
}

impl TradeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a trade row inside a caller-owned transaction.
    pub async fn insert_trade(
        tx: &mut Transaction<'_, Postgres>,
        trade: &Trade,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, model_id, coin, action, quantity, price, leverage,
                realized_pnl, fee, exchange_order_id, executed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(trade.id)
        .bind(trade.model_id)
        .bind(&trade.coin)
        .bind(trade.action.as_str())
        .bind(trade.quantity)
        .bind(trade.price)
        .bind(trade.leverage)
        .bind(trade.realized_pnl)
        .bind(trade.fee)
        .bind(&trade.exchange_order_id)
        .bind(trade.executed_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Upsert the running position row inside a caller-owned transaction.
    pub async fn upsert_position(
        tx: &mut Transaction<'_, Postgres>,
        position: &Position,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (
                model_id, coin, side, quantity, avg_entry_price, leverage,
                opened_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (model_id, coin) DO UPDATE SET
                side = EXCLUDED.side,
                quantity = EXCLUDED.quantity,
                avg_entry_price = EXCLUDED.avg_entry_price,
                leverage = EXCLUDED.leverage,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(position.model_id)
        .bind(&position.coin)
        .bind(position.side.as_str())
        .bind(position.quantity)
        .bind(position.avg_entry_price)
        .bind(position.leverage)
        .bind(position.opened_at)
        .bind(position.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Remove a fully-closed position inside a caller-owned transaction.
    pub async fn delete_position(
        tx: &mut Transaction<'_, Postgres>,
        model_id: Uuid,
        coin: &str,
    ) -> Result<()> {
        sqlx::query("DELETE FROM positions WHERE model_id = $1 AND coin = $2")
            .bind(model_id)
            .bind(coin)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Update the model's running cash balance and peak value inside a
    /// caller-owned transaction.
    pub async fn update_cash_and_peak(
        tx: &mut Transaction<'_, Postgres>,
        model_id: Uuid,
        cash_balance: Decimal,
        peak_value: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE models
            SET cash_balance = $2, peak_value = GREATEST(peak_value, $3), updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(model_id)
        .bind(cash_balance)
        .bind(peak_value)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Fetch a position with a row lock, inside a caller-owned transaction.
    pub async fn get_position_for_update(
        tx: &mut Transaction<'_, Postgres>,
        model_id: Uuid,
        coin: &str,
    ) -> Result<Option<Position>> {
        let row = sqlx::query(
            r#"
            SELECT model_id, coin, side, quantity, avg_entry_price, leverage,
                   opened_at, updated_at
            FROM positions
            WHERE model_id = $1 AND coin = $2
            FOR UPDATE
            "#,
        )
        .bind(model_id)
        .bind(coin)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|r| row_to_position(&r)).transpose()
    }

    /// Total margin reserved across open positions, inside a caller-owned
    /// transaction.
    pub async fn sum_cost_basis(
        tx: &mut Transaction<'_, Postgres>,
        model_id: Uuid,
    ) -> Result<Decimal> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(quantity * avg_entry_price / leverage), 0) AS total
            FROM positions
            WHERE model_id = $1
            "#,
        )
        .bind(model_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.get("total"))
    }

    pub async fn get_position(&self, model_id: Uuid, coin: &str) -> Result<Option<Position>> {
        let row = sqlx::query(
            r#"
            SELECT model_id, coin, side, quantity, avg_entry_price, leverage,
                   opened_at, updated_at
            FROM positions
            WHERE model_id = $1 AND coin = $2
            "#,
        )
        .bind(model_id)
        .bind(coin)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_position(&r)).transpose()
    }

    pub async fn list_positions(&self, model_id: Uuid) -> Result<Vec<Position>> {
        let rows = sqlx::query(
            r#"
            SELECT model_id, coin, side, quantity, avg_entry_price, leverage,
                   opened_at, updated_at
            FROM positions
            WHERE model_id = $1
            ORDER BY coin
            "#,
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_position).collect()
    }

    pub async fn list_trades(&self, model_id: Uuid, limit: i64) -> Result<Vec<Trade>> {
        let rows = sqlx::query(
            r#"
            SELECT id, model_id, coin, action, quantity, price, leverage,
                   realized_pnl, fee, exchange_order_id, executed_at
            FROM trades
            WHERE model_id = $1
            ORDER BY executed_at DESC
            LIMIT $2
            "#,
        )
        .bind(model_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_trade).collect()
    }

    /// All trades in execution order, for equity-curve replay.
    pub async fn list_trades_chronological(&self, model_id: Uuid) -> Result<Vec<Trade>> {
        let rows = sqlx::query(
            r#"
            SELECT id, model_id, coin, action, quantity, price, leverage,
                   realized_pnl, fee, exchange_order_id, executed_at
            FROM trades
            WHERE model_id = $1
            ORDER BY executed_at
            "#,
        )
        .bind(model_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_trade).collect()
    }

    /// Realized P&L and trade count since a day boundary.
    pub async fn daily_stats(
        &self,
        model_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<(Decimal, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(realized_pnl), 0) AS realized, COUNT(*) AS trades
            FROM trades
            WHERE model_id = $1 AND executed_at >= $2
            "#,
        )
        .bind(model_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get("realized"), row.get("trades")))
    }

    /// Last traded price per coin for this model, used as the mark price for
    /// unrealized P&L when no live feed is involved.
    pub async fn last_price(&self, model_id: Uuid, coin: &str) -> Result<Option<Decimal>> {
        let row = sqlx::query(
            r#"
            SELECT price
            FROM trades
            WHERE model_id = $1 AND coin = $2
            ORDER BY executed_at DESC
            LIMIT 1
            "#,
        )
        .bind(model_id)
        .bind(coin)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("price")))
    }

    /// Assemble the point-in-time portfolio view for risk evaluation and the
    /// dashboard. Marks positions at their last traded price, falling back to
    /// the entry price.
    pub async fn snapshot(&self, model: &Model) -> Result<PortfolioSnapshot> {
        let positions = self.list_positions(model.id).await?;

        let mut position_value = Decimal::ZERO;
        let mut unrealized = Decimal::ZERO;
        for position in &positions {
            let mark = self
                .last_price(model.id, &position.coin)
                .await?
                .unwrap_or(position.avg_entry_price);
            let pnl = position.unrealized_pnl(mark);
            position_value += position.cost_basis() + pnl;
            unrealized += pnl;
        }

        let day_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();
        let (realized_today, trades_today) = self.daily_stats(model.id, day_start).await?;

        Ok(PortfolioSnapshot {
            model_id: model.id,
            cash: model.cash_balance,
            initial_capital: model.initial_capital,
            peak_value: model.peak_value,
            positions,
            position_value,
            realized_pnl_today: realized_today,
            unrealized_pnl: unrealized,
            trades_today,
            taken_at: Utc::now(),
        })
    }
}

fn row_to_position(r: &sqlx::postgres::PgRow) -> Result<Position> {
    Ok(Position {
        model_id: r.get("model_id"),
        coin: r.get("coin"),
        side: r.get::<String, _>("side").parse()?,
        quantity: r.get("quantity"),
        avg_entry_price: r.get("avg_entry_price"),
        leverage: r.get("leverage"),
        opened_at: r.get("opened_at"),
        updated_at: r.get("updated_at"),
    })
}

fn row_to_trade(r: &sqlx::postgres::PgRow) -> Result<Trade> {
    Ok(Trade {
        id: r.get("id"),
        model_id: r.get("model_id"),
        coin: r.get("coin"),
        action: r.get::<String, _>("action").parse()?,
        quantity: r.get("quantity"),
        price: r.get("price"),
        leverage: r.get("leverage"),
        realized_pnl: r.get("realized_pnl"),
        fee: r.get("fee"),
        exchange_order_id: r.get("exchange_order_id"),
        executed_at: r.get("executed_at"),
    })
}
