use hivejar_tenantdb::TenantDbConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,

    /// Root of the config store and replication log.
    pub data_dir: String,

    /// Base64-encoded 32-byte envelope master key.
    pub master_key: String,

    pub tenant_db: TenantDbConfig,

    /// Fallback for rotate-keys requests without a graceSeconds query.
    pub rotation_grace_seconds: Option<u64>,

    /// Used to build verification links handed to the email sender.
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            data_dir: std::env::var("HIVEJAR_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            master_key: std::env::var("HIVEJAR_MASTER_KEY")
                .expect("HIVEJAR_MASTER_KEY must be set"),
            tenant_db: TenantDbConfig::from_env(),
            rotation_grace_seconds: std::env::var("KEY_ROTATION_GRACE_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok()),
            base_url: std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
        }
    }
}
