//! Exchange client boundary.
//!
//! Everything the order router needs from an exchange goes through the
//! [`ExchangeApi`] trait, so live execution can be mocked out in tests and
//! swapped between testnet and mainnet endpoints at construction time.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Order side on the exchange wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Lot-size and price filters for a trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    /// Quantity step; order quantities must be a multiple of this.
    pub step_size: Decimal,
    /// Price tick; limit prices must be a multiple of this.
    pub tick_size: Decimal,
    pub min_qty: Decimal,
    /// Minimum order value in the quote asset.
    pub min_notional: Decimal,
}

/// A single asset balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

/// Confirmed fill returned by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: String,
    pub symbol: String,
    pub executed_qty: Decimal,
    pub avg_price: Decimal,
}

/// Common interface for exchange REST clients.
///
/// Testnet and mainnet implementations differ only by base URL and key pair.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Connectivity check, unauthenticated.
    async fn ping(&self) -> Result<()>;

    /// Last traded price for a pair.
    async fn get_ticker_price(&self, symbol: &str) -> Result<Decimal>;

    /// Lot-size / tick-size / notional filters for a pair.
    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo>;

    /// All non-zero balances, authenticated.
    async fn get_balances(&self) -> Result<Vec<AssetBalance>>;

    /// Lightweight authenticated call used for credential validation.
    async fn get_account(&self) -> Result<()>;

    /// Submit a market order. With `test` set, the exchange validates the
    /// order without placing it.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        test: bool,
    ) -> Result<OrderFill>;

    /// Submit a limit order.
    async fn place_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderFill>;

    /// Cancel an open order.
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()>;
}

/// Truncate a quantity down to the exchange's step size.
///
/// Truncation (never round-to-nearest) so the submitted quantity can't exceed
/// the available balance.
pub fn truncate_to_step(quantity: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return quantity;
    }
    (quantity / step).floor() * step
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_down_to_step() {
        let step = Decimal::new(1, 3); // 0.001
        assert_eq!(
            truncate_to_step(Decimal::new(123_456, 5), step), // 1.23456
            Decimal::new(1_234, 3)                            // 1.234
        );
    }

    #[test]
    fn exact_multiple_unchanged() {
        let step = Decimal::new(1, 2);
        let qty = Decimal::new(250, 2);
        assert_eq!(truncate_to_step(qty, step), qty);
    }

    #[test]
    fn zero_step_is_identity() {
        let qty = Decimal::new(42, 1);
        assert_eq!(truncate_to_step(qty, Decimal::ZERO), qty);
    }

    #[test]
    fn side_wire_format() {
        assert_eq!(OrderSide::Buy.as_str(), "BUY");
        assert_eq!(OrderSide::Sell.as_str(), "SELL");
    }
}
