use std::time::Duration;

/// Pooling and bootstrap behavior for per-tenant data-plane databases.
#[derive(Debug, Clone)]
pub struct TenantDbConfig {
    pub default_max_connections: u32,
    pub default_min_connections: u32,

    /// Budget for opening a new pool.
    pub open_timeout: Duration,

    pub idle_timeout: Duration,

    /// Failed opens are remembered this long so repeated requests for a
    /// broken tenant do not stampede the database.
    pub negative_cache_ttl: Duration,

    /// Wait cap for the blocking advisory-lock fallback during bootstrap.
    pub lock_wait: Duration,

    /// Budget for cache pings and aggregated infra stats.
    pub stats_timeout: Duration,
}

impl Default for TenantDbConfig {
    fn default() -> Self {
        Self {
            default_max_connections: 10,
            default_min_connections: 1,
            open_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            negative_cache_ttl: Duration::from_secs(15),
            lock_wait: Duration::from_secs(30),
            stats_timeout: Duration::from_secs(2),
        }
    }
}

impl TenantDbConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_max_connections: std::env::var("TENANT_DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_max_connections),
            default_min_connections: std::env::var("TENANT_DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_min_connections),
            ..defaults
        }
    }
}
