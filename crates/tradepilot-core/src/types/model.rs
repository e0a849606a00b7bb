//! Trading model configuration and risk settings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::Error;

/// Trading environment for a model: paper ledger or real exchange routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Simulation,
    Live,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Simulation => "simulation",
            Environment::Live => "live",
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simulation" => Ok(Environment::Simulation),
            "live" => Ok(Environment::Live),
            other => Err(Error::Validation(format!(
                "unknown environment '{other}' (expected 'simulation' or 'live')"
            ))),
        }
    }
}

/// Governs whether an accepted signal executes, queues for approval, or is
/// advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AutomationLevel {
    Manual,
    SemiAutomated,
    FullyAutomated,
}

impl AutomationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationLevel::Manual => "manual",
            AutomationLevel::SemiAutomated => "semi_automated",
            AutomationLevel::FullyAutomated => "fully_automated",
        }
    }
}

impl FromStr for AutomationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(AutomationLevel::Manual),
            "semi_automated" => Ok(AutomationLevel::SemiAutomated),
            "fully_automated" => Ok(AutomationLevel::FullyAutomated),
            other => Err(Error::Validation(format!(
                "unknown automation level '{other}'"
            ))),
        }
    }
}

/// Exchange sandbox vs real-money endpoints, selected independently of the
/// trading [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeEnvironment {
    Testnet,
    Mainnet,
}

impl ExchangeEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeEnvironment::Testnet => "testnet",
            ExchangeEnvironment::Mainnet => "mainnet",
        }
    }
}

impl FromStr for ExchangeEnvironment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testnet" => Ok(ExchangeEnvironment::Testnet),
            "mainnet" => Ok(ExchangeEnvironment::Mainnet),
            other => Err(Error::Validation(format!(
                "unknown exchange environment '{other}'"
            ))),
        }
    }
}

/// A named trading configuration: AI reference, capital, and routing policy.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Model {
    pub id: Uuid,
    pub name: String,
    /// AI provider reference (collaborator; queried outside this crate).
    pub ai_provider: String,
    /// Provider-side model identifier.
    pub ai_model: String,
    pub initial_capital: Decimal,
    /// Running cash balance, updated atomically with each executed trade.
    pub cash_balance: Decimal,
    /// Highest total portfolio value seen, for drawdown tracking.
    pub peak_value: Decimal,
    pub environment: Environment,
    pub automation_level: AutomationLevel,
    pub exchange_environment: ExchangeEnvironment,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-model risk limits. One row per model, defaults applied at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RiskSettings {
    /// Max position value as % of total portfolio value.
    pub max_position_size_pct: Decimal,
    /// Max daily loss as % of initial capital.
    pub max_daily_loss_pct: Decimal,
    /// Max trades executed per day.
    pub max_daily_trades: i32,
    /// Max distinct non-zero holdings.
    pub max_open_positions: i32,
    /// Min cash as % of total portfolio value.
    pub min_cash_reserve_pct: Decimal,
    /// Max drawdown from peak as %, used by readiness scoring.
    pub max_drawdown_pct: Decimal,
    /// Minutes between scheduled decision cycles.
    pub trading_interval_minutes: i32,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_position_size_pct: Decimal::new(20, 0),
            max_daily_loss_pct: Decimal::new(5, 0),
            max_daily_trades: 10,
            max_open_positions: 5,
            min_cash_reserve_pct: Decimal::new(10, 0),
            max_drawdown_pct: Decimal::new(20, 0),
            trading_interval_minutes: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_round_trip() {
        assert_eq!(
            "simulation".parse::<Environment>().unwrap(),
            Environment::Simulation
        );
        assert_eq!("live".parse::<Environment>().unwrap(), Environment::Live);
        assert_eq!(Environment::Live.as_str(), "live");
        assert!("prod".parse::<Environment>().is_err());
    }

    #[test]
    fn automation_round_trip() {
        for level in [
            AutomationLevel::Manual,
            AutomationLevel::SemiAutomated,
            AutomationLevel::FullyAutomated,
        ] {
            assert_eq!(level.as_str().parse::<AutomationLevel>().unwrap(), level);
        }
        assert!("auto".parse::<AutomationLevel>().is_err());
    }

    #[test]
    fn exchange_environment_round_trip() {
        assert_eq!(
            "testnet".parse::<ExchangeEnvironment>().unwrap(),
            ExchangeEnvironment::Testnet
        );
        assert!("staging".parse::<ExchangeEnvironment>().is_err());
    }

    #[test]
    fn default_risk_settings() {
        let settings = RiskSettings::default();
        assert_eq!(settings.max_position_size_pct, Decimal::new(20, 0));
        assert_eq!(settings.max_daily_trades, 10);
        assert_eq!(settings.trading_interval_minutes, 60);
    }
}
