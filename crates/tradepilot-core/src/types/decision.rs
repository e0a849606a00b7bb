//! AI trade decisions and the pending-approval lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::Error;

/// An AI-proposed trade intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    BuyToEnter,
    BuyToExit,
    SellToEnter,
    SellToExit,
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::BuyToEnter => "buy_to_enter",
            Signal::BuyToExit => "buy_to_exit",
            Signal::SellToEnter => "sell_to_enter",
            Signal::SellToExit => "sell_to_exit",
            Signal::Hold => "hold",
        }
    }

    /// Whether the signal opens or adds to a position.
    pub fn is_entry(&self) -> bool {
        matches!(self, Signal::BuyToEnter | Signal::SellToEnter)
    }

    /// Whether the signal reduces or closes a position.
    pub fn is_exit(&self) -> bool {
        matches!(self, Signal::BuyToExit | Signal::SellToExit)
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy_to_enter" => Ok(Signal::BuyToEnter),
            "buy_to_exit" => Ok(Signal::BuyToExit),
            "sell_to_enter" => Ok(Signal::SellToEnter),
            "sell_to_exit" => Ok(Signal::SellToExit),
            "hold" => Ok(Signal::Hold),
            other => Err(Error::Validation(format!("unknown signal '{other}'"))),
        }
    }
}

/// A concrete decision produced by the AI collaborator for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TradeDecision {
    pub coin: String,
    pub signal: Signal,
    pub quantity: Decimal,
    pub leverage: Decimal,
    /// Provider confidence in [0, 1].
    pub confidence: f64,
    pub justification: String,
    /// Market price the provider reasoned against; simulated fills execute
    /// at this price.
    pub reference_price: Decimal,
}

impl TradeDecision {
    /// A no-action decision.
    pub fn hold(coin: impl Into<String>, justification: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            signal: Signal::Hold,
            quantity: Decimal::ZERO,
            leverage: Decimal::ONE,
            confidence: 0.0,
            justification: justification.into(),
            reference_price: Decimal::ZERO,
        }
    }
}

/// Lifecycle status of a decision awaiting human disposition.
///
/// `pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Pending => "pending",
            DecisionStatus::Approved => "approved",
            DecisionStatus::Rejected => "rejected",
            DecisionStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DecisionStatus::Pending)
    }
}

impl FromStr for DecisionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DecisionStatus::Pending),
            "approved" => Ok(DecisionStatus::Approved),
            "rejected" => Ok(DecisionStatus::Rejected),
            "expired" => Ok(DecisionStatus::Expired),
            other => Err(Error::Validation(format!(
                "unknown decision status '{other}'"
            ))),
        }
    }
}

/// A proposed trade held for human approval (semi-automated mode).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PendingDecision {
    pub id: Uuid,
    pub model_id: Uuid,
    pub coin: String,
    pub signal: Signal,
    pub quantity: Decimal,
    pub leverage: Decimal,
    pub confidence: f64,
    pub justification: String,
    pub reference_price: Decimal,
    pub status: DecisionStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub actioned_at: Option<DateTime<Utc>>,
}

impl PendingDecision {
    /// Whether the decision's approval window has lapsed.
    pub fn is_past_ttl(&self, ttl_minutes: i64, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at).num_minutes() >= ttl_minutes
    }

    pub fn decision(&self) -> TradeDecision {
        TradeDecision {
            coin: self.coin.clone(),
            signal: self.signal,
            quantity: self.quantity,
            leverage: self.leverage,
            confidence: self.confidence,
            justification: self.justification.clone(),
            reference_price: self.reference_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_round_trip() {
        for signal in [
            Signal::BuyToEnter,
            Signal::BuyToExit,
            Signal::SellToEnter,
            Signal::SellToExit,
            Signal::Hold,
        ] {
            assert_eq!(signal.as_str().parse::<Signal>().unwrap(), signal);
        }
        assert!("buy".parse::<Signal>().is_err());
    }

    #[test]
    fn signal_direction() {
        assert!(Signal::BuyToEnter.is_entry());
        assert!(Signal::SellToEnter.is_entry());
        assert!(Signal::BuyToExit.is_exit());
        assert!(Signal::SellToExit.is_exit());
        assert!(!Signal::Hold.is_entry());
        assert!(!Signal::Hold.is_exit());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!DecisionStatus::Pending.is_terminal());
        assert!(DecisionStatus::Approved.is_terminal());
        assert!(DecisionStatus::Rejected.is_terminal());
        assert!(DecisionStatus::Expired.is_terminal());
    }

    #[test]
    fn ttl_check() {
        let now = Utc::now();
        let decision = PendingDecision {
            id: Uuid::new_v4(),
            model_id: Uuid::new_v4(),
            coin: "BTC".to_string(),
            signal: Signal::BuyToEnter,
            quantity: Decimal::ONE,
            leverage: Decimal::ONE,
            confidence: 0.9,
            justification: String::new(),
            reference_price: Decimal::new(50_000, 0),
            status: DecisionStatus::Pending,
            rejection_reason: None,
            created_at: now - chrono::Duration::minutes(31),
            actioned_at: None,
        };
        assert!(decision.is_past_ttl(30, now));
        assert!(!decision.is_past_ttl(60, now));
    }
}
