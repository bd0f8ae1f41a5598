// Data-plane migration CLI
//
// Usage: hivejar-migrate <up|down> [steps]
//   up     apply pending migrations in ascending order
//   down   roll back the most recent migrations in descending order
//
// Connects to TENANT_DB_DSN (or DATABASE_URL); TENANT_DB_SCHEMA scopes
// the run, TENANT_ID namespaces the advisory lock.

use dotenvy::dotenv;
use hivejar_tenantdb::migrate::{run_down, run_pending, MigrationLock};
use hivejar_tenantdb::TenantDbConfig;
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use uuid::Uuid;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let action = match args.first().map(String::as_str) {
        Some(action @ ("up" | "down")) => action.to_string(),
        Some(other) => {
            eprintln!("unknown action '{}'; expected 'up' or 'down'", other);
            return ExitCode::from(2);
        }
        None => {
            eprintln!("usage: hivejar-migrate <up|down> [steps]");
            return ExitCode::from(2);
        }
    };

    let steps: usize = match args.get(1) {
        Some(raw) => match raw.parse() {
            Ok(steps) => steps,
            Err(_) => {
                eprintln!("steps must be a positive integer, got '{}'", raw);
                return ExitCode::from(2);
            }
        },
        None => usize::MAX,
    };

    let dsn = match std::env::var("TENANT_DB_DSN").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(dsn) => dsn,
        Err(_) => {
            eprintln!("TENANT_DB_DSN or DATABASE_URL must be set");
            return ExitCode::FAILURE;
        }
    };
    let schema = std::env::var("TENANT_DB_SCHEMA").ok();
    let tenant_id = std::env::var("TENANT_ID")
        .ok()
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .unwrap_or(Uuid::nil());

    let pool = match PgPoolOptions::new().max_connections(2).connect(&dsn).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("failed to connect: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = TenantDbConfig::from_env();
    let mut lock = match MigrationLock::acquire(&pool, tenant_id, "cli", &config).await {
        Ok(lock) => lock,
        Err(e) => {
            eprintln!("failed to acquire migration lock: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = match action.as_str() {
        "up" => run_pending(lock.conn(), schema.as_deref()).await,
        _ => run_down(lock.conn(), schema.as_deref(), steps).await,
    };

    if let Err(e) = lock.release().await {
        tracing::warn!("Failed to release migration lock: {}", e);
    }

    match outcome {
        Ok(applied) => {
            for name in &applied {
                println!("{}", name);
            }
            println!("{} migration(s) {}", applied.len(), if action == "up" { "applied" } else { "rolled back" });
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("migration failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
