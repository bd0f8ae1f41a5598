use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use hivejar_models::{ClientWithSecret, CreateClient, OAuthClient, UpdateClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Clients are tenant-scoped; the tenant rides in the query string.
#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientListResponse {
    pub clients: Vec<OAuthClient>,
    pub total: usize,
}

/// GET /v2/admin/clients?tenant=:id
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<ClientListResponse>, ApiError> {
    let clients = state.control.list_clients(&query.tenant)?;
    let total = clients.len();
    Ok(Json(ClientListResponse { clients, total }))
}

/// POST /v2/admin/clients?tenant=:id
///
/// The response carries the plaintext secret for confidential clients;
/// no later read repeats it.
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TenantQuery>,
    Json(input): Json<CreateClient>,
) -> Result<(StatusCode, Json<ClientWithSecret>), ApiError> {
    let created = state.control.create_client(&query.tenant, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /v2/admin/clients/:client_id?tenant=:id
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<OAuthClient>, ApiError> {
    Ok(Json(state.control.get_client(&query.tenant, &client_id)?))
}

/// PUT /v2/admin/clients/:client_id?tenant=:id
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<TenantQuery>,
    Json(input): Json<UpdateClient>,
) -> Result<Json<OAuthClient>, ApiError> {
    Ok(Json(
        state.control.update_client(&query.tenant, &client_id, input).await?,
    ))
}

/// POST /v2/admin/clients/:client_id/revoke?tenant=:id
///
/// Secret rotation; the fresh plaintext is returned exactly once.
pub async fn revoke_client_secret(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<ClientWithSecret>, ApiError> {
    Ok(Json(
        state.control.rotate_client_secret(&query.tenant, &client_id).await?,
    ))
}

/// DELETE /v2/admin/clients/:client_id?tenant=:id
pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(query): Query<TenantQuery>,
) -> Result<StatusCode, ApiError> {
    state.control.delete_client(&query.tenant, &client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
