//! API route definitions.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{credentials, decisions, health, models, risk, settings, trading};
use crate::state::AppState;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tradepilot API",
        version = "1.0.0",
        description = "REST API for AI-driven crypto paper/live trading models"
    ),
    paths(
        health::health_check,
        models::list_models,
        models::create_model,
        models::get_model,
        models::update_model,
        models::delete_model,
        models::get_environment,
        models::set_environment,
        models::get_automation,
        models::set_automation,
        settings::get_settings,
        settings::update_settings,
        credentials::get_credentials,
        credentials::set_credentials,
        credentials::delete_credentials,
        credentials::validate_credentials,
        credentials::get_exchange_environment,
        credentials::set_exchange_environment,
        decisions::list_decisions,
        decisions::approve_decision,
        decisions::reject_decision,
        trading::execute_cycle,
        trading::list_trades,
        trading::get_portfolio,
        trading::emergency_stop_all,
        risk::get_risk_status,
        risk::list_incidents,
        risk::get_readiness,
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::cycle::CycleOutcome,
            health::HealthResponse,
            models::CreateModelRequest,
            models::UpdateModelRequest,
            models::EnvironmentRequest,
            models::AutomationRequest,
            credentials::ExchangeEnvironmentRequest,
            credentials::ValidateResponse,
            decisions::RejectRequest,
            decisions::ApproveResponse,
            trading::PositionView,
            trading::PortfolioResponse,
            trading::EmergencyStopResponse,
            risk::RiskStatusResponse,
            tradepilot_core::types::Model,
            tradepilot_core::types::RiskSettings,
            tradepilot_core::types::Trade,
            tradepilot_core::types::Position,
            tradepilot_core::types::PendingDecision,
            tradepilot_core::types::Incident,
            tradepilot_core::db::CredentialsSummary,
            tradepilot_core::db::SetCredentials,
            risk_manager::RiskVerdict,
            risk_manager::MetricReading,
            trading_engine::router::ExecutionOutcome,
            trading_engine::readiness::ReadinessReport,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "models", description = "Trading model configuration"),
        (name = "settings", description = "Per-model risk limits"),
        (name = "credentials", description = "Exchange credentials and environments"),
        (name = "decisions", description = "Pending-decision approval workflow"),
        (name = "trading", description = "Decision cycles, trades, portfolio"),
        (name = "risk", description = "Risk status, incidents, readiness"),
    )
)]
pub struct ApiDoc;

/// Create the main router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health::health_check))

        // Models
        .route("/api/models", get(models::list_models).post(models::create_model))
        .route(
            "/api/models/{id}",
            get(models::get_model)
                .put(models::update_model)
                .delete(models::delete_model),
        )
        .route(
            "/api/models/{id}/environment",
            get(models::get_environment).post(models::set_environment),
        )
        .route(
            "/api/models/{id}/automation",
            get(models::get_automation).post(models::set_automation),
        )

        // Risk settings
        .route(
            "/api/models/{id}/settings",
            get(settings::get_settings).post(settings::update_settings),
        )

        // Exchange credentials
        .route(
            "/api/models/{id}/exchange/credentials",
            get(credentials::get_credentials)
                .post(credentials::set_credentials)
                .delete(credentials::delete_credentials),
        )
        .route(
            "/api/models/{id}/exchange/validate",
            post(credentials::validate_credentials),
        )
        .route(
            "/api/models/{id}/exchange/environment",
            get(credentials::get_exchange_environment)
                .post(credentials::set_exchange_environment),
        )

        // Pending decisions
        .route("/api/pending-decisions", get(decisions::list_decisions))
        .route(
            "/api/pending-decisions/{id}/approve",
            post(decisions::approve_decision),
        )
        .route(
            "/api/pending-decisions/{id}/reject",
            post(decisions::reject_decision),
        )

        // Trading
        .route("/api/models/{id}/execute-enhanced", post(trading::execute_cycle))
        .route("/api/models/{id}/trades", get(trading::list_trades))
        .route("/api/models/{id}/portfolio", get(trading::get_portfolio))
        .route("/api/emergency-stop-all", post(trading::emergency_stop_all))

        // Risk monitoring
        .route("/api/models/{id}/risk-status", get(risk::get_risk_status))
        .route("/api/models/{id}/incidents", get(risk::list_incidents))
        .route("/api/models/{id}/readiness", get(risk::get_readiness))

        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))

        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_spec_includes_core_surfaces() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().unwrap();
        assert!(json.contains("Tradepilot API"));
        assert!(json.contains("/api/models"));
        assert!(json.contains("/api/pending-decisions"));
        assert!(json.contains("/api/emergency-stop-all"));
        assert!(json.contains("/api/models/{id}/risk-status"));
    }
}
