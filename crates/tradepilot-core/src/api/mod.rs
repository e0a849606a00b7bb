//! Exchange API clients.

pub mod binance;
pub mod exchange;

pub use binance::BinanceClient;
pub use exchange::{
    AssetBalance, ExchangeApi, OrderFill, OrderSide, SymbolInfo,
};
