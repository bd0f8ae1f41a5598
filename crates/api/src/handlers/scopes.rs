use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use hivejar_models::{CreateScope, Scope, UpdateScope};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeListResponse {
    pub scopes: Vec<Scope>,
    pub total: usize,
}

/// GET /v2/admin/tenants/:id/scopes
pub async fn list_scopes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScopeListResponse>, ApiError> {
    let scopes = state.control.list_scopes(&id)?;
    let total = scopes.len();
    Ok(Json(ScopeListResponse { scopes, total }))
}

/// POST /v2/admin/tenants/:id/scopes
pub async fn create_scope(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<CreateScope>,
) -> Result<(StatusCode, Json<Scope>), ApiError> {
    let scope = state.control.create_scope(&id, input).await?;
    Ok((StatusCode::CREATED, Json(scope)))
}

/// GET /v2/admin/tenants/:id/scopes/:name
pub async fn get_scope(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<Scope>, ApiError> {
    Ok(Json(state.control.get_scope(&id, &name)?))
}

/// PUT /v2/admin/tenants/:id/scopes/:name
pub async fn update_scope(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
    Json(input): Json<UpdateScope>,
) -> Result<Json<Scope>, ApiError> {
    Ok(Json(state.control.update_scope(&id, &name, input).await?))
}

/// DELETE /v2/admin/tenants/:id/scopes/:name
pub async fn delete_scope(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.control.delete_scope(&id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
