use crate::error::ApiError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use hivejar_models::{ExportOptions, ImportMode, ImportReport, TenantExport};
use hivejar_tenantdb::{BootstrapReport, InfraStats};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Import payload ceiling.
const MAX_IMPORT_BYTES: usize = 10 * 1024 * 1024;

/// POST /v2/admin/tenants/:id/migrate
///
/// A busy migration lock surfaces as 409 with `Retry-After: 5`.
pub async fn migrate_tenant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BootstrapReport>, ApiError> {
    let cancel = CancellationToken::new();
    let report = state.control.bootstrap_tenant(&id, &cancel).await?;
    Ok(Json(report))
}

/// GET /v2/admin/tenants/:id/infra-stats
pub async fn infra_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<InfraStats>, ApiError> {
    let cancel = CancellationToken::new();
    let access = state.control.tenant_access(&id, &cancel).await?;
    Ok(Json(access.infra_stats(&cancel).await))
}

/// POST /v2/admin/tenants/:id/test-connection
pub async fn test_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let cancel = CancellationToken::new();
    let access = state.control.tenant_access(&id, &cancel).await?;
    access
        .test_connection(&cancel)
        .await
        .map_err(|e| hivejar_control::ControlError::from(e).into())
        .map(|_| StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportQuery {
    pub include_roles: bool,
    pub include_users: bool,
}

/// GET /v2/admin/tenants/:id/export
pub async fn export_tenant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<TenantExport>, ApiError> {
    let cancel = CancellationToken::new();
    let export = state
        .control
        .export_tenant(
            &id,
            ExportOptions {
                include_roles: query.include_roles,
                include_users: query.include_users,
            },
            &cancel,
        )
        .await?;
    Ok(Json(export))
}

/// POST /v2/admin/tenants/:id/import/validate
pub async fn validate_import(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ImportReport>, ApiError> {
    let export = parse_import_body(&body)?;
    Ok(Json(state.control.validate_import(&id, &export)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    pub mode: Option<ImportMode>,
}

/// PUT /v2/admin/tenants/:id/import?mode=merge|replace
pub async fn apply_import(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> Result<Json<ImportReport>, ApiError> {
    let export = parse_import_body(&body)?;
    let mode = query.mode.unwrap_or_default();
    let cancel = CancellationToken::new();
    Ok(Json(
        state.control.import_tenant(&id, &export, mode, &cancel).await?,
    ))
}

fn parse_import_body(body: &Bytes) -> Result<TenantExport, ApiError> {
    if body.len() > MAX_IMPORT_BYTES {
        return Err(ApiError::payload_too_large(MAX_IMPORT_BYTES));
    }
    serde_json::from_slice(body).map_err(|e| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            &format!("malformed import payload: {}", e),
        )
    })
}
