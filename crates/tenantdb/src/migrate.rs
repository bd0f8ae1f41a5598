use crate::config::TenantDbConfig;
use crate::error::{Result, TenantDbError};
use crate::pool::quote_ident;
use hivejar_models::{UserField, UserFieldType};
use serde::Serialize;
use sqlx::{Connection, PgPool};
use uuid::Uuid;

/// Embedded data-plane migrations, applied in ascending filename order.
pub const MIGRATIONS: &[(&str, &str, &str)] = &[
    (
        "0001_users",
        include_str!("../migrations/0001_users_up.sql"),
        include_str!("../migrations/0001_users_down.sql"),
    ),
    (
        "0002_sessions",
        include_str!("../migrations/0002_sessions_up.sql"),
        include_str!("../migrations/0002_sessions_down.sql"),
    ),
    (
        "0003_refresh_tokens",
        include_str!("../migrations/0003_refresh_tokens_up.sql"),
        include_str!("../migrations/0003_refresh_tokens_down.sql"),
    ),
    (
        "0004_consents",
        include_str!("../migrations/0004_consents_up.sql"),
        include_str!("../migrations/0004_consents_down.sql"),
    ),
    (
        "0005_user_roles",
        include_str!("../migrations/0005_user_roles_up.sql"),
        include_str!("../migrations/0005_user_roles_down.sql"),
    ),
];

const LOCK_NAMESPACE: &str = "hj:migrate:";

/// Cluster-wide migration lock id for a tenant: FNV-1a 64 over the lock
/// namespace plus the tenant id.
pub fn migration_lock_id(tenant_id: Uuid) -> i64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in LOCK_NAMESPACE.bytes().chain(tenant_id.to_string().bytes()) {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i64
}

/// Outcome of a bootstrap run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub migrations_applied: Vec<String>,
    pub synced_fields: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Holds the tenant's advisory lock on a dedicated connection for the
/// whole migration run; released on the same connection.
pub struct MigrationLock {
    conn: sqlx::pool::PoolConnection<sqlx::Postgres>,
    lock_id: i64,
}

impl MigrationLock {
    /// Try the fast path, then fall back to a blocking acquire capped at
    /// the configured wait. A cap overrun reports `LockBusy`.
    pub async fn acquire(
        pool: &PgPool,
        tenant_id: Uuid,
        slug: &str,
        config: &TenantDbConfig,
    ) -> Result<Self> {
        let lock_id = migration_lock_id(tenant_id);
        let mut conn = pool.acquire().await?;

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(lock_id)
            .fetch_one(&mut *conn)
            .await?;

        if !acquired {
            tracing::info!("Migration lock contended for tenant '{}', waiting", slug);
            let blocking = sqlx::query("SELECT pg_advisory_lock($1)")
                .bind(lock_id)
                .execute(&mut *conn);
            match tokio::time::timeout(config.lock_wait, blocking).await {
                Ok(result) => {
                    result?;
                }
                Err(_) => {
                    // The canceled acquire may still be queued server-side;
                    // closing the connection clears it.
                    conn.detach().close().await.ok();
                    return Err(TenantDbError::LockBusy(slug.to_string()));
                }
            }
        }

        Ok(Self { conn, lock_id })
    }

    pub fn conn(&mut self) -> &mut sqlx::PgConnection {
        &mut self.conn
    }

    pub async fn release(mut self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.lock_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

/// Apply all pending migrations on the locked connection.
///
/// Each migration runs in its own transaction together with the insert of
/// its version row; already-applied versions are skipped.
pub async fn run_pending(
    conn: &mut sqlx::PgConnection,
    schema: Option<&str>,
) -> Result<Vec<String>> {
    set_search_path(conn, schema).await?;
    ensure_version_table(conn).await?;

    let applied: Vec<String> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(&mut *conn)
        .await?;

    let mut newly_applied = Vec::new();
    for (name, up_sql, _) in MIGRATIONS {
        if applied.iter().any(|v| v == name) {
            continue;
        }

        apply_migration(conn, schema, name, up_sql).await?;

        tracing::info!("Applied migration {}", name);
        newly_applied.push(name.to_string());
    }

    Ok(newly_applied)
}

/// Apply a single migration and record its version row in one transaction.
///
/// Extracted from `run_pending` so the transaction reborrows live inside a
/// dedicated `async fn` with concrete elided lifetimes; this lets the
/// resulting future be proven `Send` at spawn sites (otherwise rustc's HRTB
/// inference trips on the `&mut *tx` sqlx executor).
async fn apply_migration(
    conn: &mut sqlx::PgConnection,
    schema: Option<&str>,
    name: &str,
    up_sql: &str,
) -> Result<()> {
    let mut tx = conn.begin().await?;
    apply_migration_stmts(tx.as_mut(), schema, name, up_sql).await?;
    tx.commit().await?;
    Ok(())
}

/// Execute one migration's statements on the transaction's connection. Taking
/// a `&mut PgConnection` (via `tx.as_mut()`) keeps the executor reborrows a
/// simple parameter reborrow, which stays `Send` under HRTB inference — unlike
/// reborrowing through a `&mut Transaction`.
async fn apply_migration_stmts(
    conn: &mut sqlx::PgConnection,
    schema: Option<&str>,
    name: &str,
    up_sql: &str,
) -> Result<()> {
    if let Some(schema) = schema {
        sqlx::query(&format!("SET search_path TO {}", quote_ident(schema)))
            .execute(&mut *conn)
            .await?;
    }
    sqlx::raw_sql(up_sql)
        .execute(&mut *conn)
        .await
        .map_err(|e| TenantDbError::Migration(format!("{}: {}", name, e)))?;
    sqlx::query("INSERT INTO schema_migrations (version) VALUES ($1)")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Roll back the most recent `steps` migrations, descending.
pub async fn run_down(
    conn: &mut sqlx::PgConnection,
    schema: Option<&str>,
    steps: usize,
) -> Result<Vec<String>> {
    set_search_path(conn, schema).await?;
    ensure_version_table(conn).await?;

    let applied: Vec<String> =
        sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version DESC")
            .fetch_all(&mut *conn)
            .await?;

    let mut rolled_back = Vec::new();
    for version in applied.into_iter().take(steps) {
        let Some((name, _, down_sql)) = MIGRATIONS.iter().find(|(n, _, _)| *n == version) else {
            return Err(TenantDbError::Migration(format!(
                "no down migration for applied version '{}'",
                version
            )));
        };

        let mut tx = conn.begin().await?;
        if let Some(schema) = schema {
            sqlx::query(&format!("SET search_path TO {}", quote_ident(schema)))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::raw_sql(down_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| TenantDbError::Migration(format!("{}: {}", name, e)))?;
        sqlx::query("DELETE FROM schema_migrations WHERE version = $1")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Rolled back migration {}", name);
        rolled_back.push(name.to_string());
    }

    Ok(rolled_back)
}

/// Synchronize custom user fields into the schema: add columns and
/// indexes, never drop anything.
pub async fn sync_user_fields(
    conn: &mut sqlx::PgConnection,
    schema: Option<&str>,
    fields: &[UserField],
) -> Result<(Vec<String>, Vec<String>)> {
    set_search_path(conn, schema).await?;

    let mut synced = Vec::new();
    let mut warnings = Vec::new();

    for field in fields {
        if !is_safe_column_name(&field.name) {
            warnings.push(format!("skipped field '{}': unsafe column name", field.name));
            continue;
        }

        let column_type = match field.field_type {
            UserFieldType::String => "TEXT",
            UserFieldType::Integer => "BIGINT",
            UserFieldType::Boolean => "BOOLEAN",
            UserFieldType::Timestamp => "TIMESTAMPTZ",
            UserFieldType::Json => "JSONB",
        };

        sqlx::query(&format!(
            "ALTER TABLE users ADD COLUMN IF NOT EXISTS {} {}",
            quote_ident(&field.name),
            column_type
        ))
        .execute(&mut *conn)
        .await
        .map_err(|e| TenantDbError::Migration(format!("add column '{}': {}", field.name, e)))?;

        if field.indexed || field.unique {
            let unique = if field.unique { "UNIQUE " } else { "" };
            sqlx::query(&format!(
                "CREATE {}INDEX IF NOT EXISTS {} ON users ({})",
                unique,
                quote_ident(&format!("idx_users_{}", field.name)),
                quote_ident(&field.name)
            ))
            .execute(&mut *conn)
            .await
            .map_err(|e| TenantDbError::Migration(format!("index '{}': {}", field.name, e)))?;
        }

        synced.push(field.name.clone());
    }

    Ok((synced, warnings))
}

async fn ensure_version_table(conn: &mut sqlx::PgConnection) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(conn)
    .await?;
    Ok(())
}

async fn set_search_path(conn: &mut sqlx::PgConnection, schema: Option<&str>) -> Result<()> {
    if let Some(schema) = schema {
        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(schema)
        ))
        .execute(&mut *conn)
        .await?;
        sqlx::query(&format!("SET search_path TO {}", quote_ident(schema)))
            .execute(conn)
            .await?;
    }
    Ok(())
}

#[allow(dead_code)]
fn _assert_send(conn: &mut sqlx::PgConnection, schema: Option<&str>, fields: &[UserField]) {
    fn is_send<T: Send>(_: &T) {}
    is_send(&_begin_commit_only(conn));
    is_send(&_in_tx_only(conn, schema));
    fn own() -> sqlx::pool::PoolConnection<sqlx::Postgres> {
        unimplemented!()
    }
    is_send(&_owned_tx(own()));
}

#[allow(dead_code)]
async fn _begin_commit_only(conn: &mut sqlx::PgConnection) -> Result<()> {
    let tx = conn.begin().await?;
    tx.commit().await?;
    Ok(())
}

#[allow(dead_code)]
async fn _in_tx_only(conn: &mut sqlx::PgConnection, schema: Option<&str>) -> Result<()> {
    let mut tx = conn.begin().await?;
    apply_migration_stmts(tx.as_mut(), schema, "x", "y").await?;
    tx.commit().await?;
    Ok(())
}

#[allow(dead_code)]
async fn _owned_tx(mut conn: sqlx::pool::PoolConnection<sqlx::Postgres>) -> Result<()> {
    let mut tx = conn.begin().await?;
    sqlx::raw_sql("x").execute(&mut *tx).await.ok();
    tx.commit().await?;
    Ok(())
}

fn is_safe_column_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name != "id"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_id_is_stable() {
        let tenant_id = Uuid::parse_str("6b9f6d5e-0000-4000-8000-000000000042").unwrap();
        let a = migration_lock_id(tenant_id);
        let b = migration_lock_id(tenant_id);
        assert_eq!(a, b);
    }

    #[test]
    fn test_lock_id_differs_per_tenant() {
        let a = migration_lock_id(Uuid::new_v4());
        let b = migration_lock_id(Uuid::new_v4());
        assert_ne!(a, b);
    }

    #[test]
    fn test_fnv_reference_vector() {
        // FNV-1a of the empty input is the offset basis; feeding the
        // namespace alone must differ from it.
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        let id = migration_lock_id(Uuid::nil());
        assert_ne!(id as u64, FNV_OFFSET);
    }

    #[test]
    fn test_migrations_are_ordered_and_paired() {
        let mut names: Vec<&str> = MIGRATIONS.iter().map(|(n, _, _)| *n).collect();
        let sorted = {
            let mut s = names.clone();
            s.sort();
            s
        };
        assert_eq!(names, sorted);
        names.dedup();
        assert_eq!(names.len(), MIGRATIONS.len());

        for (name, up, down) in MIGRATIONS {
            assert!(!up.trim().is_empty(), "{} has empty up", name);
            assert!(!down.trim().is_empty(), "{} has empty down", name);
        }
    }

    #[test]
    fn test_safe_column_names() {
        assert!(is_safe_column_name("employee_number"));
        assert!(is_safe_column_name("_hidden"));
        assert!(!is_safe_column_name("id"));
        assert!(!is_safe_column_name("Drop"));
        assert!(!is_safe_column_name("x; DROP TABLE users"));
        assert!(!is_safe_column_name(""));
    }

    #[tokio::test]
    #[ignore] // Only run with a PostgreSQL available via DATABASE_URL
    async fn test_migration_lock_serializes() {
        let dsn = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(4)
            .connect(&dsn)
            .await
            .expect("connect");

        let config = TenantDbConfig {
            lock_wait: std::time::Duration::from_millis(200),
            ..TenantDbConfig::default()
        };
        let tenant_id = Uuid::new_v4();

        let held = MigrationLock::acquire(&pool, tenant_id, "acme", &config)
            .await
            .expect("first acquire");

        // A second migrator for the same tenant must not enter the
        // critical section while the first holds the lock.
        let err = MigrationLock::acquire(&pool, tenant_id, "acme", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, TenantDbError::LockBusy(_)));

        held.release().await.expect("release");

        let reacquired = MigrationLock::acquire(&pool, tenant_id, "acme", &config)
            .await
            .expect("reacquire after release");
        reacquired.release().await.expect("release");
    }
}
