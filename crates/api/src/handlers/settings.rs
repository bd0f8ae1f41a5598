use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hivejar_models::TenantSettingsPatch;
use std::sync::Arc;

/// GET /v2/admin/tenants/:id/settings
///
/// Returns the ETag consumed by conditional PATCH; settings carry secret
/// ciphertext, so caching is disabled outright.
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (tenant, etag) = state.control.get_settings(&id)?;

    let mut response = Json(tenant.settings).into_response();
    response.headers_mut().insert(
        header::ETAG,
        HeaderValue::from_str(&etag).expect("etag is ascii"),
    );
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

/// PATCH /v2/admin/tenants/:id/settings
///
/// Requires `If-Match`: 428 when absent, 412 on mismatch.
pub async fn patch_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<TenantSettingsPatch>,
) -> Result<Response, ApiError> {
    let if_match = headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(ApiError::precondition_required)?;

    let updated = state.control.update_settings(&id, patch, if_match).await?;

    let mut response = Json(updated.tenant.settings).into_response();
    response.headers_mut().insert(
        header::ETAG,
        HeaderValue::from_str(&updated.etag).expect("etag is ascii"),
    );
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}
