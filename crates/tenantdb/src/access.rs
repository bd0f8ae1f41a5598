use crate::config::TenantDbConfig;
use crate::error::{Result, TenantDbError};
use crate::pool::{DriverPool, TenantHandle};
use crate::repositories::{
    ConsentRepository, RbacRepository, SchemaInspector, SessionRepository, TokenRepository,
    UserRepository,
};
use hivejar_cache::Cache;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Data-plane pool metrics surfaced on infra-stats endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraStats {
    pub db: Option<PoolStats>,
    pub db_ok: Option<bool>,
    pub cache_ok: Option<bool>,
}

/// Stable per-request handle onto one tenant's data plane.
///
/// Repository accessors return `None` when the tenant's driver lacks the
/// capability; callers surface `NotSupported` instead of panicking.
pub struct TenantAccess {
    slug: String,
    handle: Option<Arc<TenantHandle>>,
    config: TenantDbConfig,
}

impl TenantAccess {
    pub(crate) fn connected(slug: &str, handle: Arc<TenantHandle>, config: TenantDbConfig) -> Self {
        Self {
            slug: slug.to_string(),
            handle: Some(handle),
            config,
        }
    }

    pub(crate) fn disconnected(slug: &str, config: TenantDbConfig) -> Self {
        Self {
            slug: slug.to_string(),
            handle: None,
            config,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Succeeds iff a pool is attached; the gate for every data-plane
    /// operation.
    pub fn require_db(&self) -> Result<&Arc<TenantHandle>> {
        self.handle
            .as_ref()
            .ok_or_else(|| TenantDbError::NoDbForTenant(self.slug.clone()))
    }

    pub fn users(&self) -> Option<UserRepository> {
        self.handle.as_ref().map(|h| UserRepository::new(h.pool.clone()))
    }

    pub fn sessions(&self) -> Option<SessionRepository> {
        self.postgres().map(SessionRepository::new)
    }

    pub fn tokens(&self) -> Option<TokenRepository> {
        self.postgres().map(TokenRepository::new)
    }

    pub fn consents(&self) -> Option<ConsentRepository> {
        self.postgres().map(ConsentRepository::new)
    }

    pub fn rbac(&self) -> Option<RbacRepository> {
        self.postgres().map(RbacRepository::new)
    }

    pub fn schema(&self) -> Option<SchemaInspector> {
        let handle = self.handle.as_ref()?;
        let pool = handle.pool.postgres()?.clone();
        Some(SchemaInspector::new(pool, handle.schema.clone()))
    }

    pub fn cache(&self) -> Option<&Cache> {
        self.handle.as_ref()?.cache.as_ref()
    }

    /// Pool metrics and cache ping, gathered concurrently under the
    /// aggregate stats budget.
    pub async fn infra_stats(&self, cancel: &CancellationToken) -> InfraStats {
        let Some(handle) = self.handle.as_ref() else {
            return InfraStats {
                db: None,
                db_ok: None,
                cache_ok: None,
            };
        };

        let db = Some(PoolStats {
            size: handle.pool.size(),
            idle: handle.pool.num_idle(),
        });

        let budget = self.config.stats_timeout;
        let db_probe = async {
            tokio::time::timeout(budget, handle.pool.ping())
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false)
        };
        let cache_probe = async {
            match handle.cache.as_ref() {
                Some(cache) => Some(cache.ping(budget).await.is_ok()),
                None => None,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => InfraStats { db, db_ok: None, cache_ok: None },
            (db_ok, cache_ok) = async { tokio::join!(db_probe, cache_probe) } => InfraStats {
                db,
                db_ok: Some(db_ok),
                cache_ok,
            },
        }
    }

    /// Admin connectivity probe: `require_db` plus a live ping.
    pub async fn test_connection(&self, cancel: &CancellationToken) -> Result<()> {
        let handle = self.require_db()?;
        tokio::select! {
            _ = cancel.cancelled() => Err(TenantDbError::Canceled),
            result = tokio::time::timeout(self.config.stats_timeout, handle.pool.ping()) => {
                match result {
                    Ok(ping) => ping,
                    Err(_) => Err(TenantDbError::DeadlineExceeded),
                }
            }
        }
    }

    fn postgres(&self) -> Option<sqlx::PgPool> {
        self.handle.as_ref()?.pool.postgres().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_facade_has_no_capabilities() {
        let access = TenantAccess::disconnected("acme", TenantDbConfig::default());
        assert!(access.require_db().is_err());
        assert!(access.users().is_none());
        assert!(access.sessions().is_none());
        assert!(access.tokens().is_none());
        assert!(access.consents().is_none());
        assert!(access.rbac().is_none());
        assert!(access.schema().is_none());
        assert!(access.cache().is_none());
    }

    #[tokio::test]
    async fn test_disconnected_infra_stats_are_empty() {
        let access = TenantAccess::disconnected("acme", TenantDbConfig::default());
        let stats = access.infra_stats(&CancellationToken::new()).await;
        assert!(stats.db.is_none());
        assert!(stats.db_ok.is_none());
        assert!(stats.cache_ok.is_none());
    }

    #[allow(dead_code)]
    fn driver_pool_is_cloneable(pool: DriverPool) -> DriverPool {
        pool.clone()
    }
}
