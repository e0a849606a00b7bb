//! Database operations for the append-only incident log.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::types::{Incident, IncidentKind, IncidentSeverity};
use crate::Result;

/// Repository for incidents. Rows are only ever inserted.
#[derive(Clone)]
pub struct IncidentRepository {
    pool: PgPool,
}

impl IncidentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        model_id: Uuid,
        kind: IncidentKind,
        severity: IncidentSeverity,
        message: impl Into<String>,
    ) -> Result<Incident> {
        let incident = Incident {
            id: Uuid::new_v4(),
            model_id,
            kind,
            severity,
            message: message.into(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO incidents (id, model_id, kind, severity, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(incident.id)
        .bind(incident.model_id)
        .bind(incident.kind.as_str())
        .bind(incident.severity.as_str())
        .bind(&incident.message)
        .bind(incident.created_at)
        .execute(&self.pool)
        .await?;

        Ok(incident)
    }

    pub async fn list(&self, model_id: Uuid, limit: i64) -> Result<Vec<Incident>> {
        let rows = sqlx::query(
            r#"
            SELECT id, model_id, kind, severity, message, created_at
            FROM incidents
            WHERE model_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(model_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(Incident {
                    id: r.get("id"),
                    model_id: r.get("model_id"),
                    kind: r.get::<String, _>("kind").parse()?,
                    severity: r.get::<String, _>("severity").parse()?,
                    message: r.get("message"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }
}
