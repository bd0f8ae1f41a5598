use hivejar_control::{ControlError, ControlPlane};
use hivejar_crypto::{etag, Envelope, MASTER_KEY_LEN};
use hivejar_keys::KeyManager;
use hivejar_models::{
    ClientType, CreateClaim, CreateClient, CreateRole, CreateScope, CreateTenant, ExportOptions,
    ImportMode, KeyAlgorithm, TenantSettingsPatch, UpdateRole,
};
use hivejar_raft::{RaftConfig, RaftNode};
use hivejar_store::ConfigStore;
use hivejar_tenantdb::{TenantDbConfig, TenantDbManager};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn raft_config(node_id: &str) -> RaftConfig {
    RaftConfig {
        node_id: node_id.to_string(),
        election_timeout_min: Duration::from_millis(50),
        election_timeout_jitter: Duration::from_millis(50),
        heartbeat_interval: Duration::from_millis(20),
        ..RaftConfig::default()
    }
}

async fn leader_control_plane() -> (Arc<ControlPlane>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::open(dir.path().join("store")).unwrap());
    let raft = RaftNode::new(raft_config("node-1"), store.clone(), dir.path().join("raft")).unwrap();
    raft.run();
    tokio::time::timeout(Duration::from_secs(2), async {
        while !raft.is_leader() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("single node should become leader");

    let envelope = Envelope::new([1u8; MASTER_KEY_LEN]);
    let keys = Arc::new(KeyManager::new(store.clone(), KeyAlgorithm::RS256));
    let tenant_db = Arc::new(TenantDbManager::new(
        store.clone(),
        envelope.clone(),
        TenantDbConfig::default(),
    ));

    (
        Arc::new(ControlPlane::new(store, raft, envelope, keys, tenant_db)),
        dir,
    )
}

/// A control plane whose raft node never runs its ticker: permanently a
/// follower with no known leader.
fn follower_control_plane() -> (Arc<ControlPlane>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::open(dir.path().join("store")).unwrap());
    let raft = RaftNode::new(raft_config("node-2"), store.clone(), dir.path().join("raft")).unwrap();

    let envelope = Envelope::new([1u8; MASTER_KEY_LEN]);
    let keys = Arc::new(KeyManager::new(store.clone(), KeyAlgorithm::RS256));
    let tenant_db = Arc::new(TenantDbManager::new(
        store.clone(),
        envelope.clone(),
        TenantDbConfig::default(),
    ));

    (
        Arc::new(ControlPlane::new(store, raft, envelope, keys, tenant_db)),
        dir,
    )
}

fn create_input(slug: &str) -> CreateTenant {
    CreateTenant {
        slug: slug.to_string(),
        name: "Acme".to_string(),
        display_name: None,
        language: Some(String::new()),
        settings: None,
    }
}

#[tokio::test]
async fn test_create_and_read_tenant() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();

    let created = control
        .create_tenant(create_input("acme"), &cancel)
        .await
        .unwrap();

    // Empty language defaults to "en"; no DB configured means no
    // bootstrap error.
    assert_eq!(created.tenant.language, "en");
    assert!(created.bootstrap_error.is_none());

    let read = control.get_tenant("acme").unwrap();
    assert_eq!(read, created.tenant);

    // Lookup by UUID falls back from the slug miss.
    let by_id = control.get_tenant(&created.tenant.id.to_string()).unwrap();
    assert_eq!(by_id.id, created.tenant.id);
}

#[tokio::test]
async fn test_duplicate_slug_rejected() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();

    control.create_tenant(create_input("acme"), &cancel).await.unwrap();
    let first_id = control.get_tenant("acme").unwrap().id;

    let err = control
        .create_tenant(create_input("acme"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::AlreadyExists(_)));
    // The original tenant is untouched.
    assert_eq!(control.get_tenant("acme").unwrap().id, first_id);
}

#[tokio::test]
async fn test_slug_validation_boundaries() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();

    let exactly_32 = "a".repeat(32);
    control
        .create_tenant(create_input(&exactly_32), &cancel)
        .await
        .unwrap();

    let too_long = "a".repeat(33);
    let err = control
        .create_tenant(create_input(&too_long), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidInput(_)));

    let err = control
        .create_tenant(create_input("Bad_Slug"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidInput(_)));
}

#[tokio::test]
async fn test_tenants_are_seeded_with_system_entities() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    let scopes = control.list_scopes("acme").unwrap();
    let names: Vec<&str> = scopes.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"openid"));
    assert!(scopes.iter().all(|s| s.system));

    // System scopes are immutable and undeletable.
    let err = control.delete_scope("acme", "openid").await.unwrap_err();
    assert!(matches!(err, ControlError::Conflict(_)));

    let roles = control.list_roles("acme").unwrap();
    assert!(roles.iter().any(|r| r.name == "admin" && r.system));
}

#[tokio::test]
async fn test_settings_update_with_etag_precondition() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    let (_, current_etag) = control.get_settings("acme").unwrap();

    // Wrong precondition: 412 semantics.
    let patch: TenantSettingsPatch = serde_json::from_str(r#"{"mfaEnabled":true}"#).unwrap();
    let err = control
        .update_settings("acme", patch, "\"WRONG\"")
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::PreconditionFailed));

    // Matching precondition succeeds and the ETag moves.
    let patch: TenantSettingsPatch = serde_json::from_str(r#"{"mfaEnabled":true}"#).unwrap();
    let updated = control
        .update_settings("acme", patch, &current_etag)
        .await
        .unwrap();
    assert!(updated.tenant.settings.mfa_enabled);
    assert_ne!(updated.etag, current_etag);
    assert_eq!(updated.etag, etag(&updated.tenant.settings).unwrap());
}

#[tokio::test]
async fn test_settings_encrypts_dsn_at_rest() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    let (_, tag) = control.get_settings("acme").unwrap();
    let patch: TenantSettingsPatch = serde_json::from_str(
        r#"{"userDb":{"driver":"postgres","dsn":"postgres://u:p@db/acme"}}"#,
    )
    .unwrap();

    // The bootstrap side effect will fail against the fake DSN; the
    // settings write itself must succeed.
    let updated = control.update_settings("acme", patch, &tag).await.unwrap();
    let db = updated.tenant.settings.user_db.unwrap();
    assert!(db.dsn.is_none());
    assert!(db.dsn_enc.is_some());
}

#[tokio::test]
async fn test_confidential_client_secret_lifecycle() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    let created = control
        .create_client(
            "acme",
            CreateClient {
                name: "Backend".to_string(),
                client_type: ClientType::Confidential,
                redirect_uris: vec!["https://app.acme.test/cb".to_string()],
                allowed_origins: vec![],
                providers: vec![],
                scopes: vec!["openid".to_string()],
                secret: None,
                access_token_ttl_seconds: None,
                refresh_token_ttl_seconds: None,
                post_logout_redirect_uris: vec![],
                require_email_verification: false,
            },
        )
        .await
        .unwrap();

    let s1 = created.secret.clone().expect("create returns plaintext once");
    assert!(created.client.secret_enc.is_some());

    // Rotation returns a fresh plaintext, different from the first.
    let rotated = control
        .rotate_client_secret("acme", &created.client.client_id)
        .await
        .unwrap();
    let s2 = rotated.secret.clone().expect("rotate returns plaintext once");
    assert_ne!(s1, s2);

    // Reads never expose plaintext, only the encrypted form.
    let read = control.get_client("acme", &created.client.client_id).unwrap();
    assert!(read.secret_enc.is_some());
    let json = serde_json::to_value(&read).unwrap();
    assert!(json.get("secret").is_none());
}

#[tokio::test]
async fn test_public_client_cannot_carry_secret() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    let err = control
        .create_client(
            "acme",
            CreateClient {
                name: "SPA".to_string(),
                client_type: ClientType::Public,
                redirect_uris: vec![],
                allowed_origins: vec![],
                providers: vec![],
                scopes: vec![],
                secret: Some("nope".to_string()),
                access_token_ttl_seconds: None,
                refresh_token_ttl_seconds: None,
                post_logout_redirect_uris: vec![],
                require_email_verification: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidInput(_)));
}

#[tokio::test]
async fn test_key_rotation_with_grace_window() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    // Rotating with no prior key creates a fresh active, no retiring.
    let k1 = control.rotate_tenant_key("acme", Some(60)).await.unwrap();
    let set = control.verification_set("acme").unwrap();
    assert_eq!(set.keys.len(), 1);
    assert_eq!(set.keys[0].kid, k1.kid);

    // Second rotation: both keys verify during grace, K2 signs.
    let k2 = control.rotate_tenant_key("acme", Some(60)).await.unwrap();
    assert_ne!(k1.kid, k2.kid);

    let set = control.verification_set("acme").unwrap();
    let kids: Vec<&str> = set.keys.iter().map(|k| k.kid.as_str()).collect();
    assert_eq!(kids, vec![k2.kid.as_str(), k1.kid.as_str()]);

    let active = control.ensure_signing_key("acme").await.unwrap();
    assert_eq!(active.kid, k2.kid);
}

#[tokio::test]
async fn test_zero_grace_rotation_revokes_immediately() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    control.rotate_tenant_key("acme", Some(0)).await.unwrap();
    let k2 = control.rotate_tenant_key("acme", Some(0)).await.unwrap();

    let set = control.verification_set("acme").unwrap();
    let kids: Vec<&str> = set.keys.iter().map(|k| k.kid.as_str()).collect();
    assert_eq!(kids, vec![k2.kid.as_str()]);
}

#[tokio::test]
async fn test_lazy_key_creation_via_ensure() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    let key = control.ensure_signing_key("acme").await.unwrap();
    let again = control.ensure_signing_key("acme").await.unwrap();
    assert_eq!(key.kid, again.kid);
}

#[tokio::test]
async fn test_writes_on_follower_return_not_leader() {
    let (control, _dir) = follower_control_plane();
    let cancel = CancellationToken::new();

    let err = control
        .create_tenant(create_input("acme"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::NotLeader { .. }));

    // Nothing was persisted anywhere.
    assert!(control.list_tenants().unwrap().is_empty());
}

#[tokio::test]
async fn test_role_inheritance_cycle_rejected() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    control
        .create_role(
            "acme",
            CreateRole {
                name: "viewer".to_string(),
                description: String::new(),
                inherits_from: None,
                permissions: BTreeSet::from(["read".to_string()]),
            },
        )
        .await
        .unwrap();
    control
        .create_role(
            "acme",
            CreateRole {
                name: "editor".to_string(),
                description: String::new(),
                inherits_from: Some("viewer".to_string()),
                permissions: BTreeSet::from(["write".to_string()]),
            },
        )
        .await
        .unwrap();

    // viewer -> editor would close the loop.
    let err = control
        .update_role(
            "acme",
            "viewer",
            UpdateRole {
                description: None,
                inherits_from: Some(Some("editor".to_string())),
                permissions: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidInput(_)));

    // Inherited permissions resolve transitively.
    let permissions = control.resolve_permissions("acme", "editor").unwrap();
    assert_eq!(permissions, vec!["read".to_string(), "write".to_string()]);

    // Unknown parents are rejected outright.
    let err = control
        .create_role(
            "acme",
            CreateRole {
                name: "ghost-child".to_string(),
                description: String::new(),
                inherits_from: Some("ghost".to_string()),
                permissions: BTreeSet::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidInput(_)));
}

#[tokio::test]
async fn test_delete_tenant_cascades() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();
    control
        .create_scope(
            "acme",
            CreateScope {
                name: "read:things".to_string(),
                description: String::new(),
                display_name: String::new(),
                claims: vec![],
                depends_on: None,
            },
        )
        .await
        .unwrap();

    control.delete_tenant("acme").await.unwrap();
    assert!(matches!(
        control.get_tenant("acme").unwrap_err(),
        ControlError::NotFound(_)
    ));
    assert!(control.list_tenants().unwrap().is_empty());
}

#[tokio::test]
async fn test_export_import_roundtrip() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    control
        .create_scope(
            "acme",
            CreateScope {
                name: "read:things".to_string(),
                description: "Read".to_string(),
                display_name: String::new(),
                claims: vec![],
                depends_on: None,
            },
        )
        .await
        .unwrap();
    control
        .create_claim(
            "acme",
            CreateClaim {
                name: "department".to_string(),
                description: String::new(),
                source: "user.department".to_string(),
                enabled: true,
            },
        )
        .await
        .unwrap();
    control
        .create_role(
            "acme",
            CreateRole {
                name: "viewer".to_string(),
                description: String::new(),
                inherits_from: None,
                permissions: BTreeSet::new(),
            },
        )
        .await
        .unwrap();

    let export = control
        .export_tenant(
            "acme",
            ExportOptions {
                include_roles: true,
                include_users: false,
            },
            &cancel,
        )
        .await
        .unwrap();
    // System entities never leave.
    assert!(export.scopes.iter().all(|s| !s.system));
    assert!(export.roles.iter().all(|r| !r.system));
    assert_eq!(export.scopes.len(), 1);
    assert_eq!(export.claims.len(), 1);
    assert_eq!(export.roles.len(), 1);

    // Replace-import into a second tenant reproduces the configuration.
    control.create_tenant(create_input("beta"), &cancel).await.unwrap();
    let report = control
        .import_tenant("beta", &export, ImportMode::Replace, &cancel)
        .await
        .unwrap();
    assert_eq!(report.scopes, 1);
    assert_eq!(report.claims, 1);
    assert_eq!(report.roles, 1);

    let scopes = control.list_scopes("beta").unwrap();
    assert!(scopes.iter().any(|s| s.name == "read:things"));
    // The system seed survives a replace import.
    assert!(scopes.iter().any(|s| s.name == "openid" && s.system));
    assert!(control.list_roles("beta").unwrap().iter().any(|r| r.name == "viewer"));
}

#[tokio::test]
async fn test_list_order_is_deterministic() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    for slug in ["zeta", "acme", "mid"] {
        control.create_tenant(create_input(slug), &cancel).await.unwrap();
    }

    let slugs: Vec<String> = control
        .list_tenants()
        .unwrap()
        .into_iter()
        .map(|t| t.slug)
        .collect();
    assert_eq!(slugs, vec!["acme", "mid", "zeta"]);
}

#[tokio::test]
async fn test_replay_determinism_across_stores() {
    // Apply the same committed log to a fresh store; blobs must be
    // byte-identical.
    let (control, dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    control.create_tenant(create_input("acme"), &cancel).await.unwrap();
    control.rotate_tenant_key("acme", Some(60)).await.unwrap();

    let replica_dir = tempfile::tempdir().unwrap();
    let replica = ConfigStore::open(replica_dir.path()).unwrap();

    let log = hivejar_raft::WalLog::open(dir.path().join("raft")).unwrap();
    for entry in log.entries_after(0) {
        hivejar_raft::apply_mutation(&replica, &entry.mutation).unwrap();
    }

    let original = std::fs::read(dir.path().join("store/tenants/acme/tenant.json")).unwrap();
    let replayed = std::fs::read(replica_dir.path().join("tenants/acme/tenant.json")).unwrap();
    assert_eq!(original, replayed);

    let original_key = std::fs::read(dir.path().join("store/tenants/acme/keys/active.json")).unwrap();
    let replayed_key = std::fs::read(replica_dir.path().join("tenants/acme/keys/active.json")).unwrap();
    assert_eq!(original_key, replayed_key);
}

#[tokio::test]
async fn test_update_tenant_keeps_slug_and_id() {
    let (control, _dir) = leader_control_plane().await;
    let cancel = CancellationToken::new();
    let created = control.create_tenant(create_input("acme"), &cancel).await.unwrap();

    let updated = control
        .update_tenant(
            "acme",
            hivejar_models::UpdateTenant {
                name: Some("Acme Corp".to_string()),
                display_name: Some("ACME".to_string()),
                language: Some("de".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.id, created.tenant.id);
    assert_eq!(updated.slug, "acme");
    assert_eq!(updated.name, "Acme Corp");
    assert_eq!(updated.language, "de");
    assert!(updated.updated_at >= created.tenant.updated_at);
}
