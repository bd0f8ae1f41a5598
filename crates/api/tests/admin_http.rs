use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use hivejar_api::{config::Config, routes, AppState};
use hivejar_control::ControlPlane;
use hivejar_crypto::{Envelope, MASTER_KEY_LEN};
use hivejar_keys::KeyManager;
use hivejar_models::KeyAlgorithm;
use hivejar_raft::{RaftConfig, RaftNode};
use hivejar_store::ConfigStore;
use hivejar_tenantdb::{TenantDbConfig, TenantDbManager};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        data_dir: String::new(),
        master_key: String::new(),
        tenant_db: TenantDbConfig::default(),
        rotation_grace_seconds: None,
        base_url: "http://localhost:8080".to_string(),
    }
}

fn raft_config(node_id: &str) -> RaftConfig {
    RaftConfig {
        node_id: node_id.to_string(),
        election_timeout_min: Duration::from_millis(50),
        election_timeout_jitter: Duration::from_millis(50),
        heartbeat_interval: Duration::from_millis(20),
        ..RaftConfig::default()
    }
}

async fn build_app(run_raft: bool) -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::open(dir.path().join("store")).unwrap());
    let raft = RaftNode::new(raft_config("node-1"), store.clone(), dir.path().join("raft")).unwrap();
    if run_raft {
        raft.run();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !raft.is_leader() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("leader election");
    }

    let envelope = Envelope::new([3u8; MASTER_KEY_LEN]);
    let keys = Arc::new(KeyManager::new(store.clone(), KeyAlgorithm::RS256));
    let tenant_db = Arc::new(TenantDbManager::new(
        store.clone(),
        envelope.clone(),
        TenantDbConfig::default(),
    ));
    let control = Arc::new(ControlPlane::new(store, raft, envelope, keys, tenant_db));

    let state = Arc::new(AppState {
        control,
        config: test_config(),
    });
    (routes::create_router(state), dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value, axum::http::HeaderMap) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json, headers)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_tenant(app: &Router, slug: &str) -> serde_json::Value {
    let (status, body, _) = send(
        app,
        post_json(
            "/v2/admin/tenants",
            serde_json::json!({"slug": slug, "name": "Acme", "language": ""}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn test_create_and_read_tenant_over_http() {
    let (app, _dir) = build_app(true).await;

    let created = create_tenant(&app, "acme").await;
    assert_eq!(created["language"], "en");
    uuid::Uuid::parse_str(created["id"].as_str().unwrap()).expect("id is a UUID");
    assert!(created.get("bootstrapError").is_none());

    let (status, read, headers) = send(&app, get("/v2/admin/tenants/acme")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read, created);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/json; charset=utf-8"
    );
}

#[tokio::test]
async fn test_unknown_tenant_is_404() {
    let (app, _dir) = build_app(true).await;
    let (status, body, _) = send(&app, get("/v2/admin/tenants/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_settings_etag_flow() {
    let (app, _dir) = build_app(true).await;
    create_tenant(&app, "acme").await;

    let (status, _, headers) = send(&app, get("/v2/admin/tenants/acme/settings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
    let etag = headers.get(header::ETAG).unwrap().to_str().unwrap().to_string();

    // PATCH without If-Match: 428.
    let request = Request::builder()
        .method("PATCH")
        .uri("/v2/admin/tenants/acme/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"mfaEnabled":true}"#))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);

    // Wrong If-Match: 412.
    let request = Request::builder()
        .method("PATCH")
        .uri("/v2/admin/tenants/acme/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::IF_MATCH, "\"WRONG\"")
        .body(Body::from(r#"{"mfaEnabled":true}"#))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    // Correct If-Match: 200, new ETag.
    let request = Request::builder()
        .method("PATCH")
        .uri("/v2/admin/tenants/acme/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::IF_MATCH, etag.clone())
        .body(Body::from(r#"{"mfaEnabled":true}"#))
        .unwrap();
    let (status, body, headers) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mfaEnabled"], true);
    let new_etag = headers.get(header::ETAG).unwrap().to_str().unwrap();
    assert_ne!(new_etag, etag);
}

#[tokio::test]
async fn test_confidential_client_secret_over_http() {
    let (app, _dir) = build_app(true).await;
    create_tenant(&app, "acme").await;

    let (status, created, _) = send(
        &app,
        post_json(
            "/v2/admin/clients?tenant=acme",
            serde_json::json!({"name": "Backend", "type": "confidential"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let s1 = created["secret"].as_str().unwrap().to_string();
    let client_id = created["clientId"].as_str().unwrap().to_string();

    let (status, revoked, _) = send(
        &app,
        post_json(
            &format!("/v2/admin/clients/{}/revoke?tenant=acme", client_id),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let s2 = revoked["secret"].as_str().unwrap();
    assert_ne!(s1, s2);

    // Reads never include plaintext.
    let (status, read, _) = send(
        &app,
        get(&format!("/v2/admin/clients/{}?tenant=acme", client_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(read.get("secret").is_none());
    assert!(read.get("secretEnc").is_some());
}

#[tokio::test]
async fn test_key_rotation_over_http() {
    let (app, _dir) = build_app(true).await;
    create_tenant(&app, "acme").await;

    let (status, first, _) = send(
        &app,
        post_json(
            "/v2/admin/tenants/acme/rotate-keys?graceSeconds=60",
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let k1 = first["kid"].as_str().unwrap().to_string();

    let (status, second, _) = send(
        &app,
        post_json(
            "/v2/admin/tenants/acme/rotate-keys?graceSeconds=60",
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let k2 = second["kid"].as_str().unwrap().to_string();
    assert_ne!(k1, k2);

    // Both keys verify during the grace window; the new one leads.
    let (status, jwks, _) = send(&app, get("/v2/admin/tenants/acme/jwks")).await;
    assert_eq!(status, StatusCode::OK);
    let kids: Vec<&str> = jwks["keys"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["kid"].as_str().unwrap())
        .collect();
    assert_eq!(kids, vec![k2.as_str(), k1.as_str()]);
}

#[tokio::test]
async fn test_writes_to_follower_return_503_not_leader() {
    let (app, _dir) = build_app(false).await;

    let (status, body, _) = send(
        &app,
        post_json(
            "/v2/admin/tenants",
            serde_json::json!({"slug": "acme", "name": "Acme"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "service_unavailable");
    assert!(body["detail"].as_str().unwrap().contains("not leader"));

    // No mutation appears on the replica.
    let (status, list, _) = send(&app, get("/v2/admin/tenants")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn test_export_and_import_validate_over_http() {
    let (app, _dir) = build_app(true).await;
    create_tenant(&app, "acme").await;
    create_tenant(&app, "beta").await;

    let (status, export, _) = send(&app, get("/v2/admin/tenants/acme/export?includeRoles=true")).await;
    assert_eq!(status, StatusCode::OK);
    // System scopes and roles stay out of exports.
    assert_eq!(export["scopes"].as_array().unwrap().len(), 0);
    assert_eq!(export["roles"].as_array().unwrap().len(), 0);

    let request = Request::builder()
        .method("POST")
        .uri("/v2/admin/tenants/beta/import/validate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(export.to_string()))
        .unwrap();
    let (status, report, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["clients"], 0);
}

#[tokio::test]
async fn test_cluster_status_and_self_removal() {
    let (app, _dir) = build_app(true).await;

    let (status, body, _) = send(&app, get("/v2/admin/cluster/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodeId"], "node-1");
    assert_eq!(body["isLeader"], true);
    assert_eq!(body["numPeers"], 0);

    // Self-removal refused with a conflict.
    let request = Request::builder()
        .method("DELETE")
        .uri("/v2/admin/cluster/peers/node-1")
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn test_readiness_reports_health() {
    let (app, _dir) = build_app(true).await;
    let (status, body, _) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["storeDegraded"], false);
}

#[tokio::test]
async fn test_follower_readiness_is_degraded() {
    let (app, _dir) = build_app(false).await;
    // No ticker running: no leader known, so the replica is not ready.
    let (status, body, _) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
}
