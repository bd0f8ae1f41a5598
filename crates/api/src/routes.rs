use crate::handlers;
use crate::AppState;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use axum::{
    middleware::{self, Next},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and readiness
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness))
        // Internal replication RPCs (peer traffic)
        .route("/internal/raft/append-entries", post(handlers::cluster::append_entries))
        .route("/internal/raft/request-vote", post(handlers::cluster::request_vote))
        // Cluster administration
        .route("/v2/admin/cluster/status", get(handlers::cluster::cluster_status))
        .route("/v2/admin/cluster/peers", post(handlers::cluster::add_peer))
        .route("/v2/admin/cluster/peers/:id", delete(handlers::cluster::remove_peer))
        // Tenants
        .route(
            "/v2/admin/tenants",
            get(handlers::tenants::list_tenants).post(handlers::tenants::create_tenant),
        )
        .route(
            "/v2/admin/tenants/:id",
            get(handlers::tenants::get_tenant)
                .put(handlers::tenants::update_tenant)
                .patch(handlers::tenants::update_tenant)
                .delete(handlers::tenants::delete_tenant),
        )
        // Settings with ETag preconditions
        .route(
            "/v2/admin/tenants/:id/settings",
            get(handlers::settings::get_settings).patch(handlers::settings::patch_settings),
        )
        // Signing keys
        .route("/v2/admin/tenants/:id/rotate-keys", post(handlers::keys::rotate_tenant_keys))
        .route("/v2/admin/tenants/:id/jwks", get(handlers::keys::tenant_jwks))
        .route("/v2/admin/keys/rotate", post(handlers::keys::rotate_keys))
        // Data plane
        .route("/v2/admin/tenants/:id/migrate", post(handlers::data_plane::migrate_tenant))
        .route("/v2/admin/tenants/:id/infra-stats", get(handlers::data_plane::infra_stats))
        .route("/v2/admin/tenants/:id/test-connection", post(handlers::data_plane::test_connection))
        // Import / export
        .route("/v2/admin/tenants/:id/export", get(handlers::data_plane::export_tenant))
        .route("/v2/admin/tenants/:id/import/validate", post(handlers::data_plane::validate_import))
        .route("/v2/admin/tenants/:id/import", put(handlers::data_plane::apply_import))
        // Scopes
        .route(
            "/v2/admin/tenants/:id/scopes",
            get(handlers::scopes::list_scopes).post(handlers::scopes::create_scope),
        )
        .route(
            "/v2/admin/tenants/:id/scopes/:name",
            get(handlers::scopes::get_scope)
                .put(handlers::scopes::update_scope)
                .delete(handlers::scopes::delete_scope),
        )
        // Claims
        .route(
            "/v2/admin/tenants/:id/claims",
            get(handlers::claims::list_claims).post(handlers::claims::create_claim),
        )
        .route(
            "/v2/admin/tenants/:id/claims/:claim_id",
            get(handlers::claims::get_claim)
                .put(handlers::claims::update_claim)
                .delete(handlers::claims::delete_claim),
        )
        // Roles
        .route(
            "/v2/admin/tenants/:id/roles",
            get(handlers::roles::list_roles).post(handlers::roles::create_role),
        )
        .route(
            "/v2/admin/tenants/:id/roles/:name",
            get(handlers::roles::get_role)
                .put(handlers::roles::update_role)
                .delete(handlers::roles::delete_role),
        )
        .route(
            "/v2/admin/tenants/:id/roles/:name/permissions",
            get(handlers::roles::effective_permissions),
        )
        // Clients (tenant passed via query)
        .route(
            "/v2/admin/clients",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/v2/admin/clients/:client_id",
            get(handlers::clients::get_client)
                .put(handlers::clients::update_client)
                .delete(handlers::clients::delete_client),
        )
        .route(
            "/v2/admin/clients/:client_id/revoke",
            post(handlers::clients::revoke_client_secret),
        )
        .layer(middleware::from_fn(set_json_charset))
        .with_state(state)
}

/// Responses are JSON everywhere; pin the charset explicitly.
async fn set_json_charset(request: axum::extract::Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
    }
    response
}
