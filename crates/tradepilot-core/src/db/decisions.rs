//! Database operations for pending decisions.
//!
//! Expiry is lazy: read paths first sweep stale `pending` rows past their TTL
//! into `expired`. There is no background sweeper; staleness is bounded by
//! the dashboard's poll interval.

use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::types::{DecisionStatus, PendingDecision};
use crate::Result;

/// Repository for AI proposals awaiting human disposition.
pub struct PendingDecisionRepository {
    pool: PgPool,
}

impl PendingDecisionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, decision: &PendingDecision) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pending_decisions (
                id, model_id, coin, signal, quantity, leverage, confidence,
                justification, reference_price, status, rejection_reason,
                created_at, actioned_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(decision.id)
        .bind(decision.model_id)
        .bind(&decision.coin)
        .bind(decision.signal.as_str())
        .bind(decision.quantity)
        .bind(decision.leverage)
        .bind(decision.confidence)
        .bind(&decision.justification)
        .bind(decision.reference_price)
        .bind(decision.status.as_str())
        .bind(&decision.rejection_reason)
        .bind(decision.created_at)
        .bind(decision.actioned_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Transition stale pending rows to `expired`. Returns the number swept.
    pub async fn expire_stale(&self, model_id: Option<Uuid>, ttl_minutes: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::minutes(ttl_minutes);
        let result = sqlx::query(
            r#"
            UPDATE pending_decisions
            SET status = 'expired', actioned_at = $1
            WHERE status = 'pending'
              AND created_at <= $2
              AND ($3::uuid IS NULL OR model_id = $3)
            "#,
        )
        .bind(Utc::now())
        .bind(cutoff)
        .bind(model_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<PendingDecision>> {
        let row = sqlx::query(
            r#"
            SELECT id, model_id, coin, signal, quantity, leverage, confidence,
                   justification, reference_price, status, rejection_reason,
                   created_at, actioned_at
            FROM pending_decisions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_decision(&r)).transpose()
    }

    pub async fn list(
        &self,
        model_id: Option<Uuid>,
        status: Option<DecisionStatus>,
    ) -> Result<Vec<PendingDecision>> {
        let rows = sqlx::query(
            r#"
            SELECT id, model_id, coin, signal, quantity, leverage, confidence,
                   justification, reference_price, status, rejection_reason,
                   created_at, actioned_at
            FROM pending_decisions
            WHERE ($1::uuid IS NULL OR model_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(model_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_decision).collect()
    }

    /// Atomically claim a pending row for an approve/reject action.
    ///
    /// The `status = 'pending'` guard makes a concurrent double-submit lose
    /// the race: it sees zero rows affected and reports a terminal-state
    /// conflict instead of executing twice.
    pub async fn mark_actioned(
        &self,
        id: Uuid,
        status: DecisionStatus,
        rejection_reason: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE pending_decisions
            SET status = $2, rejection_reason = $3, actioned_at = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(rejection_reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_decision(r: &sqlx::postgres::PgRow) -> Result<PendingDecision> {
    Ok(PendingDecision {
        id: r.get("id"),
        model_id: r.get("model_id"),
        coin: r.get("coin"),
        signal: r.get::<String, _>("signal").parse()?,
        quantity: r.get("quantity"),
        leverage: r.get("leverage"),
        confidence: r.get("confidence"),
        justification: r.get("justification"),
        reference_price: r.get("reference_price"),
        status: r.get::<String, _>("status").parse()?,
        rejection_reason: r.get("rejection_reason"),
        created_at: r.get("created_at"),
        actioned_at: r.get("actioned_at"),
    })
}
