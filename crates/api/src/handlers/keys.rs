use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use hivejar_models::JwkSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateQuery {
    pub grace_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRotateQuery {
    pub tenant: String,
    pub grace_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RotateResponse {
    pub kid: String,
}

/// POST /v2/admin/tenants/:id/rotate-keys?graceSeconds=N
///
/// Grace precedence: query parameter, then the KEY_ROTATION_GRACE_SECONDS
/// environment fallback, then the built-in default.
pub async fn rotate_tenant_keys(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RotateQuery>,
) -> Result<Json<RotateResponse>, ApiError> {
    let grace = query
        .grace_seconds
        .or(state.config.rotation_grace_seconds);
    let key = state.control.rotate_tenant_key(&id, grace).await?;
    Ok(Json(RotateResponse { kid: key.kid }))
}

const KEYS_ROTATE_DEFAULT_GRACE: u64 = 86_400;

/// POST /v2/admin/keys/rotate?tenant=:id&graceSeconds=N
///
/// Same rotation with a day-long default grace.
pub async fn rotate_keys(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TenantRotateQuery>,
) -> Result<Json<RotateResponse>, ApiError> {
    let grace = query
        .grace_seconds
        .or(state.config.rotation_grace_seconds)
        .unwrap_or(KEYS_ROTATE_DEFAULT_GRACE);
    let key = state.control.rotate_tenant_key(&query.tenant, Some(grace)).await?;
    Ok(Json(RotateResponse { kid: key.kid }))
}

/// GET /v2/admin/tenants/:id/jwks
pub async fn tenant_jwks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JwkSet>, ApiError> {
    Ok(Json(state.control.verification_set(&id)?))
}
