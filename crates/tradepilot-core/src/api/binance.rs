//! Binance REST client.
//!
//! Implements [`ExchangeApi`] against the Binance spot API. Testnet and
//! mainnet differ only by base URL and credential pair; signed endpoints
//! carry a millisecond timestamp and an HMAC-SHA256 signature over the query
//! string, plus the `X-MBX-APIKEY` header.

use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

use async_trait::async_trait;

use crate::api::exchange::{AssetBalance, ExchangeApi, OrderFill, OrderSide, SymbolInfo};
use crate::types::ExchangeEnvironment;
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Binance spot REST client bound to one base URL and key pair.
pub struct BinanceClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    http_client: reqwest::Client,
}

impl BinanceClient {
    /// Real-money spot API.
    pub const MAINNET_BASE_URL: &'static str = "https://api.binance.com";
    /// Spot testnet.
    pub const TESTNET_BASE_URL: &'static str = "https://testnet.binance.vision";

    pub fn new(
        environment: ExchangeEnvironment,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        let base_url = match environment {
            ExchangeEnvironment::Testnet => Self::TESTNET_BASE_URL,
            ExchangeEnvironment::Mainnet => Self::MAINNET_BASE_URL,
        };
        Self::with_base_url(base_url, api_key, api_secret)
    }

    /// Construct against an explicit base URL (tests, self-hosted proxies).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .connect_timeout(StdDuration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// HMAC-SHA256 signature over the query string, hex-encoded.
    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_query(&self, params: &str) -> String {
        let timestamp = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={timestamp}")
        } else {
            format!("{params}&timestamp={timestamp}")
        };
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // Binance error bodies carry {"code": -xxxx, "msg": "..."}.
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<BinanceErrorBody>(&body)
            .map(|e| e.msg)
            .unwrap_or(body);
        Err(Error::Exchange {
            message: format!("{status}: {message}"),
            status: Some(status.as_u16()),
        })
    }

    async fn get_public(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http_client.get(&url).send().await?;
        Self::check_response(response).await
    }

    async fn get_signed(&self, path: &str, params: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        let response = self
            .http_client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn post_signed(&self, path: &str, params: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        let response = self
            .http_client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Self::check_response(response).await
    }
}

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    #[allow(dead_code)]
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeInfoSymbol>,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoSymbol {
    symbol: String,
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum SymbolFilter {
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        #[serde(rename = "stepSize")]
        step_size: Decimal,
        #[serde(rename = "minQty")]
        min_qty: Decimal,
    },
    #[serde(rename = "PRICE_FILTER")]
    PriceFilter {
        #[serde(rename = "tickSize")]
        tick_size: Decimal,
    },
    #[serde(rename = "NOTIONAL")]
    Notional {
        #[serde(rename = "minNotional")]
        min_notional: Decimal,
    },
    #[serde(rename = "MIN_NOTIONAL")]
    MinNotional {
        #[serde(rename = "minNotional")]
        min_notional: Decimal,
    },
    #[serde(other)]
    Other,
}

fn symbol_info_from(symbol: ExchangeInfoSymbol) -> SymbolInfo {
    let mut info = SymbolInfo {
        symbol: symbol.symbol,
        step_size: Decimal::ZERO,
        tick_size: Decimal::ZERO,
        min_qty: Decimal::ZERO,
        min_notional: Decimal::ZERO,
    };
    for filter in symbol.filters {
        match filter {
            SymbolFilter::LotSize { step_size, min_qty } => {
                info.step_size = step_size;
                info.min_qty = min_qty;
            }
            SymbolFilter::PriceFilter { tick_size } => info.tick_size = tick_size,
            SymbolFilter::Notional { min_notional }
            | SymbolFilter::MinNotional { min_notional } => {
                info.min_notional = min_notional;
            }
            SymbolFilter::Other => {}
        }
    }
    info
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: Decimal,
    locked: Decimal,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(rename = "orderId")]
    order_id: i64,
    symbol: String,
    #[serde(rename = "executedQty")]
    executed_qty: Decimal,
    #[serde(rename = "cummulativeQuoteQty", default)]
    cummulative_quote_qty: Decimal,
    #[serde(default)]
    fills: Vec<OrderResponseFill>,
}

#[derive(Debug, Deserialize)]
struct OrderResponseFill {
    price: Decimal,
    qty: Decimal,
}

impl OrderResponse {
    /// Volume-weighted fill price; falls back to quote-qty ÷ executed-qty
    /// when the fills array is absent.
    fn avg_price(&self) -> Decimal {
        let filled: Decimal = self.fills.iter().map(|f| f.qty).sum();
        if filled > Decimal::ZERO {
            let notional: Decimal = self.fills.iter().map(|f| f.price * f.qty).sum();
            return notional / filled;
        }
        if self.executed_qty > Decimal::ZERO {
            return self.cummulative_quote_qty / self.executed_qty;
        }
        Decimal::ZERO
    }
}

#[async_trait]
impl ExchangeApi for BinanceClient {
    async fn ping(&self) -> Result<()> {
        self.get_public("/api/v3/ping").await?;
        Ok(())
    }

    async fn get_ticker_price(&self, symbol: &str) -> Result<Decimal> {
        let response = self
            .get_public(&format!("/api/v3/ticker/price?symbol={symbol}"))
            .await?;
        let ticker: TickerPrice = response.json().await?;
        Ok(ticker.price)
    }

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let response = self
            .get_public(&format!("/api/v3/exchangeInfo?symbol={symbol}"))
            .await?;
        let info: ExchangeInfo = response.json().await?;
        let entry = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| Error::Exchange {
                message: format!("symbol {symbol} not found in exchange info"),
                status: None,
            })?;
        Ok(symbol_info_from(entry))
    }

    async fn get_balances(&self) -> Result<Vec<AssetBalance>> {
        let response = self.get_signed("/api/v3/account", "").await?;
        let account: AccountInfo = response.json().await?;
        Ok(account
            .balances
            .into_iter()
            .filter(|b| b.free > Decimal::ZERO || b.locked > Decimal::ZERO)
            .map(|b| AssetBalance {
                asset: b.asset,
                free: b.free,
                locked: b.locked,
            })
            .collect())
    }

    async fn get_account(&self) -> Result<()> {
        self.get_signed("/api/v3/account", "").await?;
        Ok(())
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        test: bool,
    ) -> Result<OrderFill> {
        let params = format!(
            "symbol={symbol}&side={}&type=MARKET&quantity={quantity}",
            side.as_str()
        );
        let path = if test {
            "/api/v3/order/test"
        } else {
            "/api/v3/order"
        };
        debug!(symbol, side = side.as_str(), %quantity, test, "Submitting market order");

        let response = self.post_signed(path, &params).await?;
        if test {
            // The test endpoint validates without placing; echo a synthetic fill.
            return Ok(OrderFill {
                order_id: "test".to_string(),
                symbol: symbol.to_string(),
                executed_qty: quantity,
                avg_price: Decimal::ZERO,
            });
        }
        let order: OrderResponse = response.json().await?;
        let avg_price = order.avg_price();
        Ok(OrderFill {
            order_id: order.order_id.to_string(),
            symbol: order.symbol,
            executed_qty: order.executed_qty,
            avg_price,
        })
    }

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderFill> {
        let params = format!(
            "symbol={symbol}&side={}&type=LIMIT&timeInForce=GTC&quantity={quantity}&price={price}",
            side.as_str()
        );
        let response = self.post_signed("/api/v3/order", &params).await?;
        let order: OrderResponse = response.json().await?;
        let avg_price = order.avg_price();
        Ok(OrderFill {
            order_id: order.order_id.to_string(),
            symbol: order.symbol,
            executed_qty: order.executed_qty,
            avg_price,
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()> {
        let params = format!("symbol={symbol}&orderId={order_id}");
        let url = format!(
            "{}/api/v3/order?{}",
            self.base_url,
            self.signed_query(&params)
        );
        let response = self
            .http_client
            .delete(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(symbol, order_id, status = %response.status(), "Order cancel failed");
        }
        Self::check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BinanceClient {
        BinanceClient::new(ExchangeEnvironment::Testnet, "key", "secret")
    }

    #[test]
    fn environment_selects_base_url() {
        let testnet = BinanceClient::new(ExchangeEnvironment::Testnet, "k", "s");
        assert_eq!(testnet.base_url(), BinanceClient::TESTNET_BASE_URL);

        let mainnet = BinanceClient::new(ExchangeEnvironment::Mainnet, "k", "s");
        assert_eq!(mainnet.base_url(), BinanceClient::MAINNET_BASE_URL);
    }

    #[test]
    fn signature_is_deterministic_hmac() {
        // Known vector: HMAC-SHA256("secret", "symbol=BTCUSDT") hex digest.
        let signature = client().sign("symbol=BTCUSDT");
        assert_eq!(signature.len(), 64);
        assert_eq!(signature, client().sign("symbol=BTCUSDT"));
        assert_ne!(signature, client().sign("symbol=ETHUSDT"));
    }

    #[test]
    fn signed_query_appends_timestamp_and_signature() {
        let query = client().signed_query("symbol=BTCUSDT");
        assert!(query.starts_with("symbol=BTCUSDT&timestamp="));
        assert!(query.contains("&signature="));
    }

    #[test]
    fn parses_symbol_filters() {
        let raw = r#"
        {
            "symbol": "BTCUSDT",
            "filters": [
                {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "1000000", "tickSize": "0.01"},
                {"filterType": "LOT_SIZE", "minQty": "0.00001", "maxQty": "9000", "stepSize": "0.00001"},
                {"filterType": "NOTIONAL", "minNotional": "5", "applyMinToMarket": true},
                {"filterType": "MAX_NUM_ORDERS", "maxNumOrders": 200}
            ]
        }"#;
        let symbol: ExchangeInfoSymbol = serde_json::from_str(raw).unwrap();
        let info = symbol_info_from(symbol);
        assert_eq!(info.step_size, Decimal::new(1, 5));
        assert_eq!(info.min_qty, Decimal::new(1, 5));
        assert_eq!(info.tick_size, Decimal::new(1, 2));
        assert_eq!(info.min_notional, Decimal::new(5, 0));
    }

    #[test]
    fn avg_price_prefers_fills() {
        let order = OrderResponse {
            order_id: 1,
            symbol: "BTCUSDT".to_string(),
            executed_qty: Decimal::new(2, 0),
            cummulative_quote_qty: Decimal::new(100, 0),
            fills: vec![
                OrderResponseFill {
                    price: Decimal::new(10, 0),
                    qty: Decimal::new(1, 0),
                },
                OrderResponseFill {
                    price: Decimal::new(20, 0),
                    qty: Decimal::new(1, 0),
                },
            ],
        };
        assert_eq!(order.avg_price(), Decimal::new(15, 0));
    }

    #[test]
    fn avg_price_falls_back_to_quote_qty() {
        let order = OrderResponse {
            order_id: 1,
            symbol: "BTCUSDT".to_string(),
            executed_qty: Decimal::new(4, 0),
            cummulative_quote_qty: Decimal::new(100, 0),
            fills: vec![],
        };
        assert_eq!(order.avg_price(), Decimal::new(25, 0));
    }
}
