//! Database operations for models and their risk settings.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::types::{AutomationLevel, Environment, ExchangeEnvironment, Model, RiskSettings};
use crate::{Error, Result};

/// Fields required to create a model.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub name: String,
    pub ai_provider: String,
    pub ai_model: String,
    pub initial_capital: Decimal,
}

/// Optional field updates for a model.
#[derive(Debug, Clone, Default)]
pub struct UpdateModel {
    pub name: Option<String>,
    pub ai_provider: Option<String>,
    pub ai_model: Option<String>,
    pub active: Option<bool>,
}

/// Repository for trading models.
pub struct ModelRepository {
    pool: PgPool,
}

impl ModelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a model together with its default risk settings.
    pub async fn create(&self, new: NewModel) -> Result<Model> {
        if new.initial_capital <= Decimal::ZERO {
            return Err(Error::Validation(
                "initial_capital must be positive".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let settings = RiskSettings::default();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO models (
                id, name, ai_provider, ai_model, initial_capital,
                cash_balance, peak_value, environment, automation_level,
                exchange_environment, active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $5, $5, 'simulation', 'manual', 'testnet', TRUE, $6, $6)
            "#,
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.ai_provider)
        .bind(&new.ai_model)
        .bind(new.initial_capital)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO risk_settings (
                model_id, max_position_size_pct, max_daily_loss_pct,
                max_daily_trades, max_open_positions, min_cash_reserve_pct,
                max_drawdown_pct, trading_interval_minutes, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(settings.max_position_size_pct)
        .bind(settings.max_daily_loss_pct)
        .bind(settings.max_daily_trades)
        .bind(settings.max_open_positions)
        .bind(settings.min_cash_reserve_pct)
        .bind(settings.max_drawdown_pct)
        .bind(settings.trading_interval_minutes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("model {id} vanished after insert")))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Model>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, ai_provider, ai_model, initial_capital,
                   cash_balance, peak_value, environment, automation_level,
                   exchange_environment, active, created_at, updated_at
            FROM models
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_model(&r)).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Model>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, ai_provider, ai_model, initial_capital,
                   cash_balance, peak_value, environment, automation_level,
                   exchange_environment, active, created_at, updated_at
            FROM models
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_model).collect()
    }

    /// Models eligible for scheduled decision cycles.
    pub async fn list_active(&self) -> Result<Vec<Model>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, ai_provider, ai_model, initial_capital,
                   cash_balance, peak_value, environment, automation_level,
                   exchange_environment, active, created_at, updated_at
            FROM models
            WHERE active = TRUE
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_model).collect()
    }

    pub async fn update(&self, id: Uuid, update: UpdateModel) -> Result<Model> {
        sqlx::query(
            r#"
            UPDATE models SET
                name = COALESCE($2, name),
                ai_provider = COALESCE($3, ai_provider),
                ai_model = COALESCE($4, ai_model),
                active = COALESCE($5, active),
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.ai_provider)
        .bind(update.ai_model)
        .bind(update.active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("model {id} not found")))
    }

    /// Delete a model; dependent rows cascade.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM models WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_environment(&self, id: Uuid, environment: Environment) -> Result<()> {
        self.set_field(id, "environment", environment.as_str()).await
    }

    pub async fn set_automation(&self, id: Uuid, automation: AutomationLevel) -> Result<()> {
        self.set_field(id, "automation_level", automation.as_str())
            .await
    }

    pub async fn set_exchange_environment(
        &self,
        id: Uuid,
        exchange_environment: ExchangeEnvironment,
    ) -> Result<()> {
        self.set_field(id, "exchange_environment", exchange_environment.as_str())
            .await
    }

    async fn set_field(&self, id: Uuid, column: &str, value: &str) -> Result<()> {
        // Column names come from the three setters above, never from input.
        let statement =
            format!("UPDATE models SET {column} = $2, updated_at = $3 WHERE id = $1");
        let result = sqlx::query(&statement)
            .bind(id)
            .bind(value)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("model {id} not found")));
        }
        Ok(())
    }

    /// Flip every model to simulation + manual. Returns the affected ids.
    ///
    /// Orders already in flight at the exchange are not touched; this only
    /// prevents future automated execution.
    pub async fn emergency_stop_all(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            UPDATE models
            SET environment = 'simulation', automation_level = 'manual', updated_at = $1
            WHERE environment <> 'simulation' OR automation_level <> 'manual'
            RETURNING id
            "#,
        )
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    pub async fn get_settings(&self, id: Uuid) -> Result<Option<RiskSettings>> {
        let row = sqlx::query(
            r#"
            SELECT max_position_size_pct, max_daily_loss_pct, max_daily_trades,
                   max_open_positions, min_cash_reserve_pct, max_drawdown_pct,
                   trading_interval_minutes
            FROM risk_settings
            WHERE model_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| RiskSettings {
            max_position_size_pct: r.get("max_position_size_pct"),
            max_daily_loss_pct: r.get("max_daily_loss_pct"),
            max_daily_trades: r.get("max_daily_trades"),
            max_open_positions: r.get("max_open_positions"),
            min_cash_reserve_pct: r.get("min_cash_reserve_pct"),
            max_drawdown_pct: r.get("max_drawdown_pct"),
            trading_interval_minutes: r.get("trading_interval_minutes"),
        }))
    }

    pub async fn update_settings(&self, id: Uuid, settings: &RiskSettings) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE risk_settings SET
                max_position_size_pct = $2,
                max_daily_loss_pct = $3,
                max_daily_trades = $4,
                max_open_positions = $5,
                min_cash_reserve_pct = $6,
                max_drawdown_pct = $7,
                trading_interval_minutes = $8,
                updated_at = $9
            WHERE model_id = $1
            "#,
        )
        .bind(id)
        .bind(settings.max_position_size_pct)
        .bind(settings.max_daily_loss_pct)
        .bind(settings.max_daily_trades)
        .bind(settings.max_open_positions)
        .bind(settings.min_cash_reserve_pct)
        .bind(settings.max_drawdown_pct)
        .bind(settings.trading_interval_minutes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "risk settings for model {id} not found"
            )));
        }
        Ok(())
    }
}

fn row_to_model(r: &sqlx::postgres::PgRow) -> Result<Model> {
    Ok(Model {
        id: r.get("id"),
        name: r.get("name"),
        ai_provider: r.get("ai_provider"),
        ai_model: r.get("ai_model"),
        initial_capital: r.get("initial_capital"),
        cash_balance: r.get("cash_balance"),
        peak_value: r.get("peak_value"),
        environment: r.get::<String, _>("environment").parse()?,
        automation_level: r.get::<String, _>("automation_level").parse()?,
        exchange_environment: r.get::<String, _>("exchange_environment").parse()?,
        active: r.get("active"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}
