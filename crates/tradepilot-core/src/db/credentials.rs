//! Exchange credential storage and client construction.
//!
//! Secrets are write-only from the API's perspective: [`CredentialsSummary`]
//! is the only shape that leaves this module for the wire, and it carries
//! presence booleans instead of key material.
//!
//! Storage is currently plaintext behind the [`SecretEncoder`] seam, a known
//! hardening gap. An encrypting encoder can be slotted in without touching
//! the manager's contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::{BinanceClient, ExchangeApi};
use crate::db::incidents::IncidentRepository;
use crate::types::{ExchangeEnvironment, IncidentKind, IncidentSeverity, Model};
use crate::Result;

/// Reversible encoding applied to secrets before they hit the database.
pub trait SecretEncoder: Send + Sync {
    fn encode(&self, secret: &str) -> String;
    fn decode(&self, stored: &str) -> Option<String>;
}

/// Stores secrets as given. The only shipped encoder; see module docs.
pub struct PlaintextEncoder;

impl SecretEncoder for PlaintextEncoder {
    fn encode(&self, secret: &str) -> String {
        secret.to_string()
    }

    fn decode(&self, stored: &str) -> Option<String> {
        Some(stored.to_string())
    }
}

/// Incoming credential payload. Omitted pairs leave the stored pair untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SetCredentials {
    pub mainnet_api_key: Option<String>,
    pub mainnet_api_secret: Option<String>,
    pub testnet_api_key: Option<String>,
    pub testnet_api_secret: Option<String>,
}

/// Decoded credential row, internal use only. Never serialized to the wire.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub model_id: Uuid,
    pub exchange: String,
    pub mainnet_api_key: Option<String>,
    pub mainnet_api_secret: Option<String>,
    pub testnet_api_key: Option<String>,
    pub testnet_api_secret: Option<String>,
    pub active: bool,
    pub last_validated_at: Option<DateTime<Utc>>,
}

impl StoredCredentials {
    /// Key pair for the given exchange environment, if complete.
    pub fn pair_for(&self, environment: ExchangeEnvironment) -> Option<(String, String)> {
        let (key, secret) = match environment {
            ExchangeEnvironment::Mainnet => (&self.mainnet_api_key, &self.mainnet_api_secret),
            ExchangeEnvironment::Testnet => (&self.testnet_api_key, &self.testnet_api_secret),
        };
        match (key, secret) {
            (Some(k), Some(s)) => Some((k.clone(), s.clone())),
            _ => None,
        }
    }
}

/// What the credentials GET endpoint is allowed to reveal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CredentialsSummary {
    pub exchange: String,
    pub has_mainnet: bool,
    pub has_testnet: bool,
    pub active: bool,
    pub last_validated_at: Option<DateTime<Utc>>,
}

/// Raw row access for exchange credentials.
pub struct CredentialsRepository {
    pool: PgPool,
}

impl CredentialsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        model_id: Uuid,
        set: &SetCredentials,
        encoder: &dyn SecretEncoder,
    ) -> Result<()> {
        let encode = |value: &Option<String>| value.as_deref().map(|s| encoder.encode(s));

        sqlx::query(
            r#"
            INSERT INTO exchange_credentials (
                model_id, exchange, mainnet_api_key, mainnet_api_secret,
                testnet_api_key, testnet_api_secret, active, updated_at
            )
            VALUES ($1, 'binance', $2, $3, $4, $5, TRUE, $6)
            ON CONFLICT (model_id) DO UPDATE SET
                mainnet_api_key = COALESCE(EXCLUDED.mainnet_api_key, exchange_credentials.mainnet_api_key),
                mainnet_api_secret = COALESCE(EXCLUDED.mainnet_api_secret, exchange_credentials.mainnet_api_secret),
                testnet_api_key = COALESCE(EXCLUDED.testnet_api_key, exchange_credentials.testnet_api_key),
                testnet_api_secret = COALESCE(EXCLUDED.testnet_api_secret, exchange_credentials.testnet_api_secret),
                active = TRUE,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(model_id)
        .bind(encode(&set.mainnet_api_key))
        .bind(encode(&set.mainnet_api_secret))
        .bind(encode(&set.testnet_api_key))
        .bind(encode(&set.testnet_api_secret))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fetch(
        &self,
        model_id: Uuid,
        encoder: &dyn SecretEncoder,
    ) -> Result<Option<StoredCredentials>> {
        let row = sqlx::query(
            r#"
            SELECT model_id, exchange, mainnet_api_key, mainnet_api_secret,
                   testnet_api_key, testnet_api_secret, active, last_validated_at
            FROM exchange_credentials
            WHERE model_id = $1
            "#,
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let decode = |column: &str| {
                r.get::<Option<String>, _>(column)
                    .and_then(|s| encoder.decode(&s))
            };
            StoredCredentials {
                model_id: r.get("model_id"),
                exchange: r.get("exchange"),
                mainnet_api_key: decode("mainnet_api_key"),
                mainnet_api_secret: decode("mainnet_api_secret"),
                testnet_api_key: decode("testnet_api_key"),
                testnet_api_secret: decode("testnet_api_secret"),
                active: r.get("active"),
                last_validated_at: r.get("last_validated_at"),
            }
        }))
    }

    pub async fn summary(&self, model_id: Uuid) -> Result<Option<CredentialsSummary>> {
        let row = sqlx::query(
            r#"
            SELECT exchange,
                   (mainnet_api_key IS NOT NULL AND mainnet_api_secret IS NOT NULL) AS has_mainnet,
                   (testnet_api_key IS NOT NULL AND testnet_api_secret IS NOT NULL) AS has_testnet,
                   active, last_validated_at
            FROM exchange_credentials
            WHERE model_id = $1
            "#,
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| CredentialsSummary {
            exchange: r.get("exchange"),
            has_mainnet: r.get("has_mainnet"),
            has_testnet: r.get("has_testnet"),
            active: r.get("active"),
            last_validated_at: r.get("last_validated_at"),
        }))
    }

    pub async fn delete(&self, model_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM exchange_credentials WHERE model_id = $1")
            .bind(model_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_validated(&self, model_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE exchange_credentials SET last_validated_at = $2 WHERE model_id = $1",
        )
        .bind(model_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Per-model exchange credential manager: store, summarize, build clients,
/// validate connectivity.
pub struct CredentialsManager {
    repo: CredentialsRepository,
    incidents: IncidentRepository,
    encoder: Box<dyn SecretEncoder>,
}

impl CredentialsManager {
    pub fn new(pool: PgPool, encoder: Box<dyn SecretEncoder>) -> Self {
        Self {
            repo: CredentialsRepository::new(pool.clone()),
            incidents: IncidentRepository::new(pool),
            encoder,
        }
    }

    /// Upsert credentials for a model and log the change.
    pub async fn set(&self, model_id: Uuid, set: &SetCredentials) -> Result<()> {
        self.repo.upsert(model_id, set, self.encoder.as_ref()).await?;
        self.incidents
            .record(
                model_id,
                IncidentKind::CredentialChange,
                IncidentSeverity::Info,
                "Exchange credentials updated",
            )
            .await?;
        info!(model_id = %model_id, "Exchange credentials updated");
        Ok(())
    }

    pub async fn summary(&self, model_id: Uuid) -> Result<Option<CredentialsSummary>> {
        self.repo.summary(model_id).await
    }

    /// Remove a model's credentials and log the change.
    pub async fn delete(&self, model_id: Uuid) -> Result<bool> {
        let removed = self.repo.delete(model_id).await?;
        if removed {
            self.incidents
                .record(
                    model_id,
                    IncidentKind::CredentialChange,
                    IncidentSeverity::Warning,
                    "Exchange credentials deleted",
                )
                .await?;
        }
        Ok(removed)
    }

    /// Build an exchange client for the model's configured exchange
    /// environment. Returns `None` (and logs) when the matching key pair is
    /// missing.
    pub async fn get_client(&self, model: &Model) -> Result<Option<BinanceClient>> {
        let stored = self.repo.fetch(model.id, self.encoder.as_ref()).await?;
        let Some(stored) = stored else {
            warn!(model_id = %model.id, "No exchange credentials stored");
            return Ok(None);
        };
        match stored.pair_for(model.exchange_environment) {
            Some((key, secret)) => Ok(Some(BinanceClient::new(
                model.exchange_environment,
                key,
                secret,
            ))),
            None => {
                warn!(
                    model_id = %model.id,
                    environment = model.exchange_environment.as_str(),
                    "No key pair stored for the configured exchange environment"
                );
                Ok(None)
            }
        }
    }

    /// Lightweight authenticated connectivity check. Expected auth failures
    /// return `false`; `last_validated_at` only moves on success.
    pub async fn validate(&self, model: &Model) -> Result<bool> {
        let Some(client) = self.get_client(model).await? else {
            return Ok(false);
        };
        match client.get_account().await {
            Ok(()) => {
                self.repo.touch_validated(model.id).await?;
                Ok(true)
            }
            Err(e) => {
                info!(model_id = %model.id, error = %e, "Credential validation failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_encoder_round_trip() {
        let encoder = PlaintextEncoder;
        let stored = encoder.encode("sk-live-abc123");
        assert_eq!(stored, "sk-live-abc123");
        assert_eq!(encoder.decode(&stored).as_deref(), Some("sk-live-abc123"));
    }

    #[test]
    fn pair_selection_per_environment() {
        let creds = StoredCredentials {
            model_id: Uuid::new_v4(),
            exchange: "binance".to_string(),
            mainnet_api_key: Some("mk".to_string()),
            mainnet_api_secret: Some("ms".to_string()),
            testnet_api_key: Some("tk".to_string()),
            testnet_api_secret: None,
            active: true,
            last_validated_at: None,
        };
        assert_eq!(
            creds.pair_for(ExchangeEnvironment::Mainnet),
            Some(("mk".to_string(), "ms".to_string()))
        );
        // Incomplete pair counts as absent.
        assert_eq!(creds.pair_for(ExchangeEnvironment::Testnet), None);
    }

    #[test]
    fn summary_never_carries_secrets() {
        let summary = CredentialsSummary {
            exchange: "binance".to_string(),
            has_mainnet: true,
            has_testnet: false,
            active: true,
            last_validated_at: None,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("has_mainnet"));
        assert!(!json.contains("api_key"));
        assert!(!json.contains("api_secret"));
    }
}
