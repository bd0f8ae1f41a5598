// HiveJar Admin API Server
// Main entry point for the multi-tenant control plane

use dotenvy::dotenv;
use hivejar_api::{config::Config, routes, AppState};
use hivejar_control::ControlPlane;
use hivejar_crypto::Envelope;
use hivejar_keys::KeyManager;
use hivejar_models::KeyAlgorithm;
use hivejar_raft::{RaftConfig, RaftNode};
use hivejar_store::ConfigStore;
use hivejar_tenantdb::TenantDbManager;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,hivejar_api=debug,tower_http=debug".to_string()),
        )
        .init();

    tracing::info!("Starting HiveJar control plane");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env();
    tracing::info!("Server: {}:{}", config.server_host, config.server_port);
    tracing::info!("Data dir: {}", config.data_dir);

    // Envelope master key for secrets at rest
    let envelope = Envelope::from_base64(&config.master_key)
        .expect("HIVEJAR_MASTER_KEY must be a base64-encoded 32-byte key");

    // Config store
    let store = Arc::new(
        ConfigStore::open(Path::new(&config.data_dir).join("store"))
            .expect("Failed to open config store"),
    );
    store.set_degraded_hook(Box::new(|degraded| {
        if degraded {
            tracing::error!("Config store degraded; readiness will report it");
        } else {
            tracing::info!("Config store healthy again");
        }
    }));
    tracing::info!("Config store ready (version {})", store.version());

    // Replication
    let raft_config = RaftConfig::from_env();
    tracing::info!(
        "Replication: node={} peers={}",
        raft_config.node_id,
        raft_config.peers.len()
    );
    let raft = RaftNode::new(
        raft_config,
        store.clone(),
        Path::new(&config.data_dir).join("raft"),
    )
    .expect("Failed to open replication log");
    raft.run();

    // Key manager with the optional retirement sweeper
    let keys = Arc::new(KeyManager::new(store.clone(), KeyAlgorithm::RS256));
    {
        let sweeper = Arc::clone(&keys);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                tick.tick().await;
                sweeper.sweep(chrono::Utc::now());
            }
        });
    }
    tracing::info!("Key manager ready");

    // Tenant data-plane manager
    let tenant_db = Arc::new(TenantDbManager::new(
        store.clone(),
        envelope.clone(),
        config.tenant_db.clone(),
    ));
    tracing::info!("Tenant DB manager ready");

    // Control plane
    let control = Arc::new(ControlPlane::new(
        store,
        raft,
        envelope,
        keys,
        tenant_db,
    ));
    control.set_jwks_hook(Box::new(|slug| {
        tracing::debug!("JWKS invalidated for tenant '{}'", slug);
    }));
    tracing::info!("Control plane ready");

    // Router
    let state = Arc::new(AppState {
        control: control.clone(),
        config: config.clone(),
    });
    let app = routes::create_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!("Ready at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
            control.shutdown();
        })
        .await
        .expect("Server error");

    Ok(())
}
