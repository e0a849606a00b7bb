//! Router behavior at the exchange boundary, with the exchange mocked out.
//!
//! Uses a lazily-connected pool: paths under test either never reach the
//! database or are expected to fail before committing anything.

use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::*;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;

use tradepilot_core::api::exchange::{
    AssetBalance, ExchangeApi, OrderFill, OrderSide, SymbolInfo,
};
use tradepilot_core::db::{IncidentRepository, PendingDecisionRepository};
use tradepilot_core::types::{
    AutomationLevel, Environment, ExchangeEnvironment, Model, Signal, TradeDecision,
};
use tradepilot_core::{Error, Result};
use trading_engine::ledger::LedgerWriter;
use trading_engine::router::OrderRouter;

mock! {
    Exchange {}

    #[async_trait]
    impl ExchangeApi for Exchange {
        async fn ping(&self) -> Result<()>;
        async fn get_ticker_price(&self, symbol: &str) -> Result<Decimal>;
        async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo>;
        async fn get_balances(&self) -> Result<Vec<AssetBalance>>;
        async fn get_account(&self) -> Result<()>;
        async fn place_market_order(
            &self,
            symbol: &str,
            side: OrderSide,
            quantity: Decimal,
            test: bool,
        ) -> Result<OrderFill>;
        async fn place_limit_order(
            &self,
            symbol: &str,
            side: OrderSide,
            quantity: Decimal,
            price: Decimal,
        ) -> Result<OrderFill>;
        async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()>;
    }
}

fn router() -> OrderRouter {
    // Never actually connects unless a test path reaches the database.
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost:1/unreachable")
        .expect("lazy pool");
    OrderRouter::new(
        LedgerWriter::new(pool.clone(), Decimal::ZERO),
        PendingDecisionRepository::new(pool.clone()),
        IncidentRepository::new(pool),
        "USDT",
    )
}

fn model(environment: Environment, automation: AutomationLevel) -> Model {
    Model {
        id: uuid::Uuid::new_v4(),
        name: "test".to_string(),
        ai_provider: "none".to_string(),
        ai_model: "none".to_string(),
        initial_capital: Decimal::new(10_000, 0),
        cash_balance: Decimal::new(10_000, 0),
        peak_value: Decimal::new(10_000, 0),
        environment,
        automation_level: automation,
        exchange_environment: ExchangeEnvironment::Testnet,
        active: true,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

fn buy_decision(quantity: Decimal) -> TradeDecision {
    TradeDecision {
        coin: "BTC".to_string(),
        signal: Signal::BuyToEnter,
        quantity,
        leverage: Decimal::ONE,
        confidence: 0.9,
        justification: "test".to_string(),
        reference_price: Decimal::new(50_000, 0),
    }
}

fn btc_filters() -> SymbolInfo {
    SymbolInfo {
        symbol: "BTCUSDT".to_string(),
        step_size: Decimal::new(1, 3), // 0.001
        tick_size: Decimal::new(1, 2),
        min_qty: Decimal::new(1, 3),
        min_notional: Decimal::new(10, 0),
    }
}

#[tokio::test]
async fn simulation_models_never_touch_the_exchange() {
    // A mock with no expectations panics on any call: handing it to the
    // router proves the simulation path stays off the exchange entirely.
    // (The ledger write itself fails on the unreachable pool; the property
    // under test is only that the exchange stays uncalled.)
    let exchange = MockExchange::new();
    let router = router();

    for automation in [
        AutomationLevel::Manual,
        AutomationLevel::SemiAutomated,
        AutomationLevel::FullyAutomated,
    ] {
        let model = model(Environment::Simulation, automation);
        let _ = router
            .route(&model, &buy_decision(Decimal::ONE), Some(&exchange))
            .await;
    }
}

#[tokio::test]
async fn live_manual_is_advisory_without_exchange_calls() {
    let exchange = MockExchange::new();
    let router = router();
    let model = model(Environment::Live, AutomationLevel::Manual);

    let outcome = router
        .route(&model, &buy_decision(Decimal::ONE), Some(&exchange))
        .await
        .expect("advisory routing needs no I/O");
    assert!(matches!(
        outcome,
        trading_engine::router::ExecutionOutcome::Advisory { .. }
    ));
}

#[tokio::test]
async fn hold_signals_short_circuit() {
    let exchange = MockExchange::new();
    let router = router();
    let model = model(Environment::Live, AutomationLevel::FullyAutomated);
    let decision = TradeDecision::hold("BTC", "sideways market");

    let outcome = router
        .route(&model, &decision, Some(&exchange))
        .await
        .expect("hold requires no I/O");
    assert!(matches!(
        outcome,
        trading_engine::router::ExecutionOutcome::Held
    ));
}

#[tokio::test]
async fn quantity_below_minimum_is_rejected_before_ordering() {
    let mut exchange = MockExchange::new();
    exchange
        .expect_get_symbol_info()
        .with(eq("BTCUSDT"))
        .times(1)
        .returning(|_| Ok(btc_filters()));
    // place_market_order is never expected: the validation error comes first.

    let router = router();
    let model = model(Environment::Live, AutomationLevel::FullyAutomated);
    let tiny = buy_decision(Decimal::new(1, 4)); // 0.0001 truncates below min

    let err = router
        .route(&model, &tiny, Some(&exchange))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn notional_below_minimum_is_rejected_before_ordering() {
    let mut exchange = MockExchange::new();
    exchange
        .expect_get_symbol_info()
        .returning(|_| {
            Ok(SymbolInfo {
                min_notional: Decimal::new(100_000, 0),
                ..btc_filters()
            })
        });

    let router = router();
    let model = model(Environment::Live, AutomationLevel::FullyAutomated);

    let err = router
        .route(&model, &buy_decision(Decimal::ONE), Some(&exchange))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn missing_credentials_fail_without_exchange() {
    let router = router();
    let model = model(Environment::Live, AutomationLevel::FullyAutomated);

    let err = router
        .route(&model, &buy_decision(Decimal::ONE), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingCredentials(_)));
}

#[tokio::test]
async fn exchange_rejection_surfaces_raw_error_without_retry() {
    let mut exchange = MockExchange::new();
    exchange
        .expect_get_symbol_info()
        .returning(|_| Ok(btc_filters()));
    exchange
        .expect_place_market_order()
        .times(1) // exactly one attempt, no automatic retry
        .returning(|_, _, _, _| {
            Err(Error::Exchange {
                message: "Account has insufficient balance".to_string(),
                status: Some(400),
            })
        });

    let router = router();
    let model = model(Environment::Live, AutomationLevel::FullyAutomated);

    let err = router
        .route(&model, &buy_decision(Decimal::ONE), Some(&exchange))
        .await
        .unwrap_err();
    match err {
        Error::Exchange { message, .. } => {
            assert!(message.contains("insufficient balance"));
        }
        other => panic!("expected Exchange error, got {other:?}"),
    }
}
