use crate::access::TenantAccess;
use crate::config::TenantDbConfig;
use crate::error::{Result, TenantDbError};
use crate::migrate::{run_pending, sync_user_fields, BootstrapReport, MigrationLock};
use crate::pool::{open_cache, open_pool, TenantHandle};
use hivejar_crypto::Envelope;
use hivejar_models::{secrets, Tenant, UserDbDriver, UserField};
use hivejar_store::ConfigStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Process-wide registry of per-tenant data-plane pools.
///
/// Pools open lazily on first use and are keyed by slug. The registry is
/// guarded by a reader/writer lock: the fast path is a read-locked lookup,
/// the write lock is held only while opening or evicting.
pub struct TenantDbManager {
    store: Arc<ConfigStore>,
    envelope: Envelope,
    config: TenantDbConfig,
    pools: RwLock<HashMap<String, Arc<TenantHandle>>>,
    /// TTL memo of slugs whose open recently failed. Prevents reconnect
    /// storms against a broken DSN; invalidated on settings change.
    failed_opens: moka::sync::Cache<String, ()>,
}

impl TenantDbManager {
    pub fn new(store: Arc<ConfigStore>, envelope: Envelope, config: TenantDbConfig) -> Self {
        let failed_opens = moka::sync::Cache::builder()
            .time_to_live(config.negative_cache_ttl)
            .build();
        Self {
            store,
            envelope,
            config,
            pools: RwLock::new(HashMap::new()),
            failed_opens,
        }
    }

    /// Pool handle for a tenant, opening it on first use.
    pub async fn for_tenant(
        &self,
        slug: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<TenantHandle>> {
        if let Some(handle) = self.pools.read().await.get(slug) {
            return Ok(handle.clone());
        }

        if self.open_recently_failed(slug) {
            return Err(TenantDbError::NoDbForTenant(slug.to_string()));
        }

        let mut pools = self.pools.write().await;
        // Double-check: another request may have opened it while we
        // waited for the write lock.
        if let Some(handle) = pools.get(slug) {
            return Ok(handle.clone());
        }

        match self.open(slug, cancel).await {
            Ok(handle) => {
                let handle = Arc::new(handle);
                pools.insert(slug.to_string(), handle.clone());
                Ok(handle)
            }
            Err(e) => {
                // Cancellation is the caller's doing, not the tenant's.
                if !matches!(e, TenantDbError::Canceled) {
                    self.remember_failed_open(slug);
                }
                Err(e)
            }
        }
    }

    /// Close and forget the cached handle; the next `for_tenant` reopens
    /// with fresh settings.
    pub async fn refresh(&self, slug: &str) {
        self.forget_failed_open(slug);
        let removed = self.pools.write().await.remove(slug);
        if let Some(handle) = removed {
            tracing::info!("Refreshing data-plane pool for tenant '{}'", slug);
            handle.pool.close().await;
        }
    }

    /// Evict without reopening; the pool drains in the background.
    pub async fn clear(&self, slug: &str) {
        self.forget_failed_open(slug);
        if let Some(handle) = self.pools.write().await.remove(slug) {
            tracing::info!("Evicting data-plane pool for tenant '{}'", slug);
            tokio::spawn(async move {
                handle.pool.close().await;
            });
        }
    }

    /// Run pending migrations and synchronize custom user fields, under
    /// the tenant's cluster-wide migration lock.
    pub async fn bootstrap(
        &self,
        slug: &str,
        cancel: &CancellationToken,
    ) -> Result<BootstrapReport> {
        let tenant = self.resolve_tenant(slug)?;
        let handle = self.for_tenant(slug, cancel).await?;

        let Some(pg) = handle.pool.postgres() else {
            return Err(TenantDbError::NotSupported(format!(
                "bootstrap is not supported for the {:?} driver",
                handle.pool.driver()
            )));
        };

        let mut lock = MigrationLock::acquire(pg, tenant.id, slug, &self.config).await?;

        // Extracted into an `async fn` (rather than an inline `async` block)
        // so each borrowed argument gets its own elided lifetime; this lets
        // the outer `bootstrap` future be proven `Send` at spawn sites,
        // working around an HRTB inference limitation around the sqlx
        // `&mut PgConnection` executor held across the `select!` await.
        let run: std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<BootstrapReport>> + Send + '_>,
        > = Box::pin(run_migrations_and_fields(
            &mut lock,
            handle.schema.as_deref(),
            &tenant.settings.user_fields,
        ));

        let report = tokio::select! {
            _ = cancel.cancelled() => Err(TenantDbError::Canceled),
            result = run => result,
        };

        // Release on the same connection whether or not the run succeeded.
        if let Err(e) = lock.release().await {
            tracing::warn!("Failed to release migration lock for '{}': {}", slug, e);
        }

        let report = report?;
        tracing::info!(
            "Bootstrap complete for tenant '{}': {} migrations, {} fields",
            slug,
            report.migrations_applied.len(),
            report.synced_fields.len()
        );
        Ok(report)
    }

    /// Per-request facade; a tenant without a usable data plane yields a
    /// facade whose `require_db` reports `NoDbForTenant`.
    pub async fn access(&self, slug: &str, cancel: &CancellationToken) -> TenantAccess {
        match self.for_tenant(slug, cancel).await {
            Ok(handle) => TenantAccess::connected(slug, handle, self.config.clone()),
            Err(TenantDbError::Canceled) => TenantAccess::disconnected(slug, self.config.clone()),
            Err(e) => {
                tracing::debug!("No data plane for tenant '{}': {}", slug, e);
                TenantAccess::disconnected(slug, self.config.clone())
            }
        }
    }

    async fn open(&self, slug: &str, cancel: &CancellationToken) -> Result<TenantHandle> {
        let tenant = self.resolve_tenant(slug)?;

        let Some(db) = tenant.settings.user_db.as_ref() else {
            return Err(TenantDbError::NoDbForTenant(slug.to_string()));
        };

        let dsn_enc = db
            .dsn_enc
            .as_ref()
            .ok_or_else(|| TenantDbError::NoDbForTenant(slug.to_string()))?;
        let dsn = self
            .envelope
            .open_string(dsn_enc, &secrets::dsn_aad(slug))?;

        let pool = open_pool(slug, db, &dsn, &self.config, cancel).await?;
        tracing::info!(
            "Opened {:?} pool for tenant '{}' (schema: {:?})",
            db.driver,
            slug,
            db.schema
        );

        let cache = match &tenant.settings.cache {
            Some(settings) => open_cache(slug, settings).await,
            None => None,
        };

        Ok(TenantHandle {
            slug: slug.to_string(),
            pool,
            schema: match db.driver {
                UserDbDriver::Postgres => db.schema.clone(),
                _ => None,
            },
            cache,
        })
    }

    fn resolve_tenant(&self, slug: &str) -> Result<Tenant> {
        self.store
            .get_tenant(slug)?
            .ok_or_else(|| TenantDbError::TenantNotFound(slug.to_string()))
    }

    fn open_recently_failed(&self, slug: &str) -> bool {
        self.failed_opens.get(slug).is_some()
    }

    fn remember_failed_open(&self, slug: &str) {
        self.failed_opens.insert(slug.to_string(), ());
    }

    fn forget_failed_open(&self, slug: &str) {
        self.failed_opens.invalidate(slug);
    }
}

/// Run pending migrations then synchronize custom user fields on the
/// locked connection. Factored out of `bootstrap` as an `async fn` for
/// its lifetime-elision behavior (see the call site).
async fn run_migrations_and_fields(
    lock: &mut MigrationLock,
    schema: Option<&str>,
    user_fields: &[UserField],
) -> Result<BootstrapReport> {
    let migrations_applied = run_pending(lock.conn(), schema).await?;
    let (synced_fields, warnings) = sync_user_fields(lock.conn(), schema, user_fields).await?;
    Ok(BootstrapReport {
        migrations_applied,
        synced_fields,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hivejar_crypto::MASTER_KEY_LEN;
    use hivejar_models::TenantSettings;
    use uuid::Uuid;

    fn manager_with_tenant(settings: TenantSettings) -> (TenantDbManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path()).unwrap());
        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: "acme".to_string(),
            name: "Acme".to_string(),
            display_name: String::new(),
            language: "en".to_string(),
            settings,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.put_tenant(&tenant).unwrap();

        let manager = TenantDbManager::new(
            store,
            Envelope::new([7u8; MASTER_KEY_LEN]),
            TenantDbConfig::default(),
        );
        (manager, dir)
    }

    #[tokio::test]
    async fn test_tenant_without_db_reports_no_db() {
        let (manager, _dir) = manager_with_tenant(TenantSettings::default());
        let err = manager
            .for_tenant("acme", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TenantDbError::NoDbForTenant(_)));
    }

    #[tokio::test]
    async fn test_unknown_tenant_reports_not_found() {
        let (manager, _dir) = manager_with_tenant(TenantSettings::default());
        let err = manager
            .for_tenant("ghost", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TenantDbError::TenantNotFound(_)));
    }

    #[tokio::test]
    async fn test_access_without_db_yields_disconnected_facade() {
        let (manager, _dir) = manager_with_tenant(TenantSettings::default());
        let access = manager.access("acme", &CancellationToken::new()).await;
        assert!(matches!(
            access.require_db().unwrap_err(),
            TenantDbError::NoDbForTenant(_)
        ));
        assert!(access.users().is_none());
    }

    #[tokio::test]
    async fn test_failed_open_is_negative_cached() {
        let (manager, _dir) = manager_with_tenant(TenantSettings::default());
        let cancel = CancellationToken::new();

        let _ = manager.for_tenant("acme", &cancel).await;
        assert!(manager.open_recently_failed("acme"));

        // Settings change clears the memo so the next open retries.
        manager.refresh("acme").await;
        assert!(!manager.open_recently_failed("acme"));
    }
}
