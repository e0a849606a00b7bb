//! Risk settings handlers.

use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use tradepilot_core::types::RiskSettings;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Get a model's risk settings.
#[utoipa::path(
    get,
    path = "/api/models/{id}/settings",
    tag = "settings",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Risk settings", body = RiskSettings),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RiskSettings>> {
    let settings = state
        .models
        .get_settings(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("risk settings for model {id} not found")))?;
    Ok(Json(settings))
}

fn validate_settings(settings: &RiskSettings) -> ApiResult<()> {
    let percent_fields = [
        ("max_position_size_pct", settings.max_position_size_pct),
        ("max_daily_loss_pct", settings.max_daily_loss_pct),
        ("min_cash_reserve_pct", settings.min_cash_reserve_pct),
        ("max_drawdown_pct", settings.max_drawdown_pct),
    ];
    for (name, value) in percent_fields {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(ApiError::Validation(format!(
                "{name} must be between 0 and 100, got {value}"
            )));
        }
    }
    if settings.max_daily_trades <= 0 {
        return Err(ApiError::Validation(
            "max_daily_trades must be positive".to_string(),
        ));
    }
    if settings.max_open_positions <= 0 {
        return Err(ApiError::Validation(
            "max_open_positions must be positive".to_string(),
        ));
    }
    if settings.trading_interval_minutes <= 0 {
        return Err(ApiError::Validation(
            "trading_interval_minutes must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Replace a model's risk settings.
#[utoipa::path(
    post,
    path = "/api/models/{id}/settings",
    tag = "settings",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = RiskSettings,
    responses(
        (status = 200, description = "Updated settings", body = RiskSettings),
        (status = 404, description = "Model not found"),
        (status = 422, description = "Invalid settings")
    )
)]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(settings): Json<RiskSettings>,
) -> ApiResult<Json<RiskSettings>> {
    validate_settings(&settings)?;
    state.models.update_settings(id, &settings).await?;
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        assert!(validate_settings(&RiskSettings::default()).is_ok());
    }

    #[test]
    fn out_of_range_percentages_rejected() {
        let settings = RiskSettings {
            max_position_size_pct: Decimal::new(150, 0),
            ..Default::default()
        };
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn non_positive_counts_rejected() {
        let settings = RiskSettings {
            max_daily_trades: 0,
            ..Default::default()
        };
        assert!(validate_settings(&settings).is_err());

        let settings = RiskSettings {
            trading_interval_minutes: -5,
            ..Default::default()
        };
        assert!(validate_settings(&settings).is_err());
    }
}
