//! Exchange credential handlers.
//!
//! Secrets are write-only: the GET endpoint returns presence booleans and
//! metadata, never key material.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use tradepilot_core::db::{CredentialsSummary, SetCredentials};
use tradepilot_core::types::{ExchangeEnvironment, Model};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Exchange environment switch body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExchangeEnvironmentRequest {
    pub exchange_environment: ExchangeEnvironment,
}

/// Validation result.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
}

async fn load_model(state: &AppState, id: Uuid) -> ApiResult<Model> {
    state
        .models
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("model {id} not found")))
}

/// Credential presence for a model. Never returns raw secrets.
#[utoipa::path(
    get,
    path = "/api/models/{id}/exchange/credentials",
    tag = "credentials",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Credential summary", body = CredentialsSummary),
        (status = 404, description = "Model or credentials not found")
    )
)]
pub async fn get_credentials(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CredentialsSummary>> {
    load_model(&state, id).await?;
    let summary = state
        .credentials
        .summary(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no credentials stored for model {id}")))?;
    Ok(Json(summary))
}

/// Store or update exchange API key pairs for a model.
#[utoipa::path(
    post,
    path = "/api/models/{id}/exchange/credentials",
    tag = "credentials",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = SetCredentials,
    responses(
        (status = 200, description = "Stored; presence summary returned", body = CredentialsSummary),
        (status = 404, description = "Model not found"),
        (status = 422, description = "No key material supplied")
    )
)]
pub async fn set_credentials(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetCredentials>,
) -> ApiResult<Json<CredentialsSummary>> {
    load_model(&state, id).await?;

    let supplies_pair = (request.mainnet_api_key.is_some() && request.mainnet_api_secret.is_some())
        || (request.testnet_api_key.is_some() && request.testnet_api_secret.is_some());
    if !supplies_pair {
        return Err(ApiError::Validation(
            "supply a complete key/secret pair for mainnet or testnet".to_string(),
        ));
    }

    state.credentials.set(id, &request).await?;
    let summary = state
        .credentials
        .summary(id)
        .await?
        .ok_or_else(|| ApiError::Internal("credentials vanished after upsert".to_string()))?;
    Ok(Json(summary))
}

/// Delete a model's stored credentials.
#[utoipa::path(
    delete,
    path = "/api/models/{id}/exchange/credentials",
    tag = "credentials",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 204, description = "Credentials deleted"),
        (status = 404, description = "Model or credentials not found")
    )
)]
pub async fn delete_credentials(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    load_model(&state, id).await?;
    if !state.credentials.delete(id).await? {
        return Err(ApiError::NotFound(format!(
            "no credentials stored for model {id}"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Validate stored credentials with a lightweight authenticated call.
#[utoipa::path(
    post,
    path = "/api/models/{id}/exchange/validate",
    tag = "credentials",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Validation outcome", body = ValidateResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn validate_credentials(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ValidateResponse>> {
    let model = load_model(&state, id).await?;
    let valid = state.credentials.validate(&model).await?;
    Ok(Json(ValidateResponse { valid }))
}

/// Read the model's exchange environment (testnet/mainnet).
#[utoipa::path(
    get,
    path = "/api/models/{id}/exchange/environment",
    tag = "credentials",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Current exchange environment", body = ExchangeEnvironmentRequest),
        (status = 404, description = "Model not found")
    )
)]
pub async fn get_exchange_environment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let model = load_model(&state, id).await?;
    Ok(Json(serde_json::json!({
        "exchange_environment": model.exchange_environment
    })))
}

/// Switch the model between exchange testnet and mainnet.
#[utoipa::path(
    post,
    path = "/api/models/{id}/exchange/environment",
    tag = "credentials",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = ExchangeEnvironmentRequest,
    responses(
        (status = 200, description = "Exchange environment updated", body = Model),
        (status = 404, description = "Model not found")
    )
)]
pub async fn set_exchange_environment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ExchangeEnvironmentRequest>,
) -> ApiResult<Json<Model>> {
    state
        .models
        .set_exchange_environment(id, request.exchange_environment)
        .await?;
    let model = load_model(&state, id).await?;
    Ok(Json(model))
}
