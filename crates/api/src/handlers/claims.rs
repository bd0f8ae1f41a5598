use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use hivejar_models::{ClaimDefinition, CreateClaim, UpdateClaim};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimListResponse {
    pub claims: Vec<ClaimDefinition>,
    pub total: usize,
}

/// GET /v2/admin/tenants/:id/claims
pub async fn list_claims(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClaimListResponse>, ApiError> {
    let claims = state.control.list_claims(&id)?;
    let total = claims.len();
    Ok(Json(ClaimListResponse { claims, total }))
}

/// POST /v2/admin/tenants/:id/claims
pub async fn create_claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<CreateClaim>,
) -> Result<(StatusCode, Json<ClaimDefinition>), ApiError> {
    let claim = state.control.create_claim(&id, input).await?;
    Ok((StatusCode::CREATED, Json(claim)))
}

/// GET /v2/admin/tenants/:id/claims/:claim_id
pub async fn get_claim(
    State(state): State<Arc<AppState>>,
    Path((id, claim_id)): Path<(String, Uuid)>,
) -> Result<Json<ClaimDefinition>, ApiError> {
    Ok(Json(state.control.get_claim(&id, claim_id)?))
}

/// PUT /v2/admin/tenants/:id/claims/:claim_id
pub async fn update_claim(
    State(state): State<Arc<AppState>>,
    Path((id, claim_id)): Path<(String, Uuid)>,
    Json(input): Json<UpdateClaim>,
) -> Result<Json<ClaimDefinition>, ApiError> {
    Ok(Json(state.control.update_claim(&id, claim_id, input).await?))
}

/// DELETE /v2/admin/tenants/:id/claims/:claim_id
pub async fn delete_claim(
    State(state): State<Arc<AppState>>,
    Path((id, claim_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state.control.delete_claim(&id, claim_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
