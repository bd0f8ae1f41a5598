use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use hivejar_models::{CreateTenant, Tenant, UpdateTenant};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantListResponse {
    pub tenants: Vec<Tenant>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantResponse {
    #[serde(flatten)]
    pub tenant: Tenant,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_error: Option<String>,
}

/// GET /v2/admin/tenants
pub async fn list_tenants(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TenantListResponse>, ApiError> {
    let tenants = state.control.list_tenants()?;
    let total = tenants.len();
    Ok(Json(TenantListResponse { tenants, total }))
}

/// POST /v2/admin/tenants
pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateTenant>,
) -> Result<(StatusCode, Json<CreateTenantResponse>), ApiError> {
    let cancel = CancellationToken::new();
    let created = state.control.create_tenant(input, &cancel).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateTenantResponse {
            tenant: created.tenant,
            bootstrap_error: created.bootstrap_error,
        }),
    ))
}

/// GET /v2/admin/tenants/:id  (`id` is slug or UUID)
pub async fn get_tenant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Tenant>, ApiError> {
    Ok(Json(state.control.get_tenant(&id)?))
}

/// PUT/PATCH /v2/admin/tenants/:id
pub async fn update_tenant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<UpdateTenant>,
) -> Result<Json<Tenant>, ApiError> {
    Ok(Json(state.control.update_tenant(&id, input).await?))
}

/// DELETE /v2/admin/tenants/:id
pub async fn delete_tenant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.control.delete_tenant(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
