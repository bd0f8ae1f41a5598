use crate::config::TenantDbConfig;
use crate::error::{Result, TenantDbError};
use hivejar_cache::{Cache, CacheConfig};
use hivejar_models::{UserDbConfig, UserDbDriver};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::{MySqlPool, PgPool};
use tokio_util::sync::CancellationToken;

/// Driver-specific connection pool for one tenant.
#[derive(Clone)]
pub enum DriverPool {
    Postgres(PgPool),
    MySql(MySqlPool),
}

impl DriverPool {
    pub fn driver(&self) -> UserDbDriver {
        match self {
            DriverPool::Postgres(_) => UserDbDriver::Postgres,
            DriverPool::MySql(_) => UserDbDriver::Mysql,
        }
    }

    pub fn postgres(&self) -> Option<&PgPool> {
        match self {
            DriverPool::Postgres(pool) => Some(pool),
            DriverPool::MySql(_) => None,
        }
    }

    pub async fn ping(&self) -> Result<()> {
        match self {
            DriverPool::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DriverPool::MySql(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }

    pub fn size(&self) -> u32 {
        match self {
            DriverPool::Postgres(pool) => pool.size(),
            DriverPool::MySql(pool) => pool.size(),
        }
    }

    pub fn num_idle(&self) -> usize {
        match self {
            DriverPool::Postgres(pool) => pool.num_idle(),
            DriverPool::MySql(pool) => pool.num_idle(),
        }
    }

    pub async fn close(&self) {
        match self {
            DriverPool::Postgres(pool) => pool.close().await,
            DriverPool::MySql(pool) => pool.close().await,
        }
    }
}

/// Everything the data-plane facade needs for one tenant: the pool, the
/// schema scope, and the tenant's cache connection when configured.
pub struct TenantHandle {
    pub slug: String,
    pub pool: DriverPool,
    pub schema: Option<String>,
    pub cache: Option<Cache>,
}

/// Open a driver-appropriate pool from decrypted settings.
///
/// Honors the caller's cancellation token and the configured open
/// timeout; a timeout surfaces as `DeadlineExceeded` so the manager can
/// negative-cache the failure.
pub async fn open_pool(
    slug: &str,
    db: &UserDbConfig,
    dsn: &str,
    config: &TenantDbConfig,
    cancel: &CancellationToken,
) -> Result<DriverPool> {
    let max_connections = db.max_connections.unwrap_or(config.default_max_connections);

    let connect = async {
        match db.driver {
            UserDbDriver::Postgres => {
                let mut options = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .min_connections(config.default_min_connections)
                    .acquire_timeout(config.open_timeout)
                    .idle_timeout(config.idle_timeout);

                // Scope every connection to the tenant schema up front.
                if let Some(schema) = db.schema.clone() {
                    options = options.after_connect(move |conn, _meta| {
                        let schema = schema.clone();
                        Box::pin(async move {
                            sqlx::query(&format!("SET search_path TO {}", quote_ident(&schema)))
                                .execute(conn)
                                .await?;
                            Ok(())
                        })
                    });
                }

                Ok(DriverPool::Postgres(options.connect(dsn).await?))
            }
            UserDbDriver::Mysql => {
                let options = MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .min_connections(config.default_min_connections)
                    .acquire_timeout(config.open_timeout)
                    .idle_timeout(config.idle_timeout);
                Ok(DriverPool::MySql(options.connect(dsn).await?))
            }
            UserDbDriver::Mongo => Err(TenantDbError::NotSupported(
                "mongo driver has no pool implementation".to_string(),
            )),
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(TenantDbError::Canceled),
        result = tokio::time::timeout(config.open_timeout, connect) => match result {
            Ok(pool) => pool,
            Err(_) => {
                tracing::warn!("Pool open timed out for tenant '{}'", slug);
                Err(TenantDbError::DeadlineExceeded)
            }
        },
    }
}

/// Open the tenant's cache connection; failures degrade to `None` so the
/// data plane still serves requests without a cache.
pub async fn open_cache(slug: &str, settings: &hivejar_models::CacheSettings) -> Option<Cache> {
    let config = CacheConfig {
        url: settings.url.clone(),
        key_prefix: if settings.key_prefix.is_empty() {
            slug.to_string()
        } else {
            settings.key_prefix.clone()
        },
    };
    match Cache::new(config).await {
        Ok(cache) => Some(cache),
        Err(e) => {
            tracing::warn!("Cache unavailable for tenant '{}': {}", slug, e);
            None
        }
    }
}

/// Double-quote a SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("tenant_a"), "\"tenant_a\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn test_mongo_driver_not_supported() {
        let db = UserDbConfig {
            driver: UserDbDriver::Mongo,
            dsn: None,
            dsn_enc: None,
            schema: None,
            max_connections: None,
        };
        let err = open_pool(
            "acme",
            &db,
            "mongodb://localhost/acme",
            &TenantDbConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TenantDbError::NotSupported(_)));
    }
}
