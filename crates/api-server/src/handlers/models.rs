//! Model CRUD and routing-policy handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use tradepilot_core::db::{NewModel, UpdateModel};
use tradepilot_core::types::{AutomationLevel, Environment, Model};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request to create a model.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateModelRequest {
    pub name: String,
    /// AI provider reference, e.g. `openai`.
    pub ai_provider: String,
    /// Provider-side model identifier.
    pub ai_model: String,
    pub initial_capital: Decimal,
}

/// Partial model update.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateModelRequest {
    pub name: Option<String>,
    pub ai_provider: Option<String>,
    pub ai_model: Option<String>,
    pub active: Option<bool>,
}

/// Environment switch body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EnvironmentRequest {
    pub environment: Environment,
}

/// Automation switch body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AutomationRequest {
    pub automation: AutomationLevel,
}

/// List all models.
#[utoipa::path(
    get,
    path = "/api/models",
    tag = "models",
    responses(
        (status = 200, description = "All models", body = [Model])
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Model>>> {
    Ok(Json(state.models.list().await?))
}

/// Create a model with default risk settings.
#[utoipa::path(
    post,
    path = "/api/models",
    tag = "models",
    request_body = CreateModelRequest,
    responses(
        (status = 201, description = "Model created", body = Model),
        (status = 422, description = "Invalid model configuration")
    )
)]
pub async fn create_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateModelRequest>,
) -> ApiResult<(StatusCode, Json<Model>)> {
    if request.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".to_string()));
    }

    let model = state
        .models
        .create(NewModel {
            name: request.name,
            ai_provider: request.ai_provider,
            ai_model: request.ai_model,
            initial_capital: request.initial_capital,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(model)))
}

/// Get one model.
#[utoipa::path(
    get,
    path = "/api/models/{id}",
    tag = "models",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "The model", body = Model),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Model>> {
    let model = state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;
    Ok(Json(model))
}

/// Update model fields.
#[utoipa::path(
    put,
    path = "/api/models/{id}",
    tag = "models",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = UpdateModelRequest,
    responses(
        (status = 200, description = "Updated model", body = Model),
        (status = 404, description = "Model not found")
    )
)]
pub async fn update_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateModelRequest>,
) -> ApiResult<Json<Model>> {
    let model = state
        .models
        .update(
            id,
            UpdateModel {
                name: request.name,
                ai_provider: request.ai_provider,
                ai_model: request.ai_model,
                active: request.active,
            },
        )
        .await?;
    Ok(Json(model))
}

/// Delete a model and its dependent rows.
#[utoipa::path(
    delete,
    path = "/api/models/{id}",
    tag = "models",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 204, description = "Model deleted"),
        (status = 404, description = "Model not found")
    )
)]
pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.models.delete(id).await? {
        return Err(ApiError::NotFound(format!("model {id} not found")));
    }
    state.risk_tracker.forget(id);
    Ok(StatusCode::NO_CONTENT)
}

/// Read the model's trading environment.
#[utoipa::path(
    get,
    path = "/api/models/{id}/environment",
    tag = "models",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Current environment", body = EnvironmentRequest),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_environment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let model = state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;
    Ok(Json(
        serde_json::json!({ "environment": model.environment }),
    ))
}

/// Switch the model between simulation and live.
#[utoipa::path(
    post,
    path = "/api/models/{id}/environment",
    tag = "models",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = EnvironmentRequest,
    responses(
        (status = 200, description = "Environment updated", body = Model),
        (status = 404, description = "Model not found")
    )
)]
pub async fn set_environment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<EnvironmentRequest>,
) -> ApiResult<Json<Model>> {
    state.models.set_environment(id, request.environment).await?;
    let model = state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;
    Ok(Json(model))
}

/// Read the model's automation level.
#[utoipa::path(
    get,
    path = "/api/models/{id}/automation",
    tag = "models",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Current automation level", body = AutomationRequest),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_automation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let model = state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;
    Ok(Json(
        serde_json::json!({ "automation": model.automation_level }),
    ))
}

/// Switch the model's automation level.
#[utoipa::path(
    post,
    path = "/api/models/{id}/automation",
    tag = "models",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = AutomationRequest,
    responses(
        (status = 200, description = "Automation updated", body = Model),
        (status = 404, description = "Model not found")
    )
)]
pub async fn set_automation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AutomationRequest>,
) -> ApiResult<Json<Model>> {
    state.models.set_automation(id, request.automation).await?;
    let model = state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))?;
    Ok(Json(model))
}
