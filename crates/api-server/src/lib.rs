//! API Server
//!
//! REST API for the Tradepilot trading system.
//!
//! # Features
//!
//! - **REST API**: model, settings, credential and decision management
//! - **Decision cycles**: on-demand and scheduled evaluate/route pipelines
//! - **OpenAPI**: auto-generated Swagger documentation
//!
//! # Example
//!
//! ```ignore
//! use api_server::{ApiServer, ServerConfig};
//!
//! let config = ServerConfig::from_env();
//! let server = ApiServer::new(config, pool);
//! server.run().await?;
//! ```

pub mod cycle;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use cycle::run_cycle;
pub use error::ApiError;
pub use routes::create_router;
pub use scheduler::spawn_trading_scheduler;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use sqlx::PgPool;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use tradepilot_core::config::TradingConfig;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable CORS for all origins (development only).
    pub cors_permissive: bool,
    /// Trading pipeline knobs (quote asset, fees, TTLs, scheduler tick).
    pub trading: TradingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_permissive: true,
            trading: TradingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create from environment variables.
    pub fn from_env(trading: TradingConfig) -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .or_else(|_| std::env::var("API_PORT"))
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            cors_permissive: std::env::var("CORS_PERMISSIVE")
                .map(|v| v == "true")
                .unwrap_or(true),
            trading,
        }
    }

    /// Get the socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }
}

/// The API server.
pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server with the default (hold-only) decision
    /// provider. Use [`AppState::with_provider`] + [`Self::with_state`] to
    /// wire a real AI collaborator.
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let state = AppState::new(pool, config.trading.clone());
        Self { config, state }
    }

    pub fn with_state(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Run the server.
    pub async fn run(self) -> anyhow::Result<()> {
        let state = self.state.into_arc();

        // Background trading-cycle scheduler.
        spawn_trading_scheduler(state.clone());

        let router = create_router(state)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB
            .layer(if self.config.cors_permissive {
                CorsLayer::permissive()
            } else {
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any)
            });

        let addr = self.config.socket_addr();
        info!(address = %addr, "Starting API server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
