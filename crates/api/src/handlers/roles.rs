use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use hivejar_models::{CreateRole, Role, UpdateRole};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleListResponse {
    pub roles: Vec<Role>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePermissionsResponse {
    pub role: String,
    pub permissions: Vec<String>,
}

/// GET /v2/admin/tenants/:id/roles
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoleListResponse>, ApiError> {
    let roles = state.control.list_roles(&id)?;
    let total = roles.len();
    Ok(Json(RoleListResponse { roles, total }))
}

/// POST /v2/admin/tenants/:id/roles
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<CreateRole>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let role = state.control.create_role(&id, input).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /v2/admin/tenants/:id/roles/:name
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.control.get_role(&id, &name)?))
}

/// GET /v2/admin/tenants/:id/roles/:name/permissions
pub async fn effective_permissions(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<EffectivePermissionsResponse>, ApiError> {
    let permissions = state.control.resolve_permissions(&id, &name)?;
    Ok(Json(EffectivePermissionsResponse { role: name, permissions }))
}

/// PUT /v2/admin/tenants/:id/roles/:name
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
    Json(input): Json<UpdateRole>,
) -> Result<Json<Role>, ApiError> {
    Ok(Json(state.control.update_role(&id, &name, input).await?))
}

/// DELETE /v2/admin/tenants/:id/roles/:name
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.control.delete_role(&id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
