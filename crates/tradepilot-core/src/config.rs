//! Configuration management for the Tradepilot system.

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub trading: TradingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Quote asset appended to coin symbols when building trading pairs.
    pub quote_asset: String,
    /// Fee rate applied to simulated fills (fraction, e.g. 0.001 = 10 bps).
    pub sim_fee_rate: rust_decimal::Decimal,
    /// Minutes before an unactioned pending decision expires.
    pub pending_decision_ttl_minutes: i64,
    /// Scheduler tick in seconds (each tick checks which models are due).
    pub scheduler_tick_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            quote_asset: "USDT".to_string(),
            sim_fee_rate: rust_decimal::Decimal::ZERO,
            pending_decision_ttl_minutes: 30,
            scheduler_tick_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| Error::Config {
                    message: "DATABASE_URL environment variable not set".to_string(),
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            },
            trading: TradingConfig {
                quote_asset: env::var("QUOTE_ASSET").unwrap_or_else(|_| "USDT".to_string()),
                sim_fee_rate: env::var("SIM_FEE_RATE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(rust_decimal::Decimal::ZERO),
                pending_decision_ttl_minutes: env::var("PENDING_DECISION_TTL_MINUTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
                scheduler_tick_secs: env::var("SCHEDULER_TICK_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trading_defaults() {
        let config = TradingConfig::default();
        assert_eq!(config.quote_asset, "USDT");
        assert_eq!(config.pending_decision_ttl_minutes, 30);
        assert!(config.sim_fee_rate.is_zero());
    }
}
