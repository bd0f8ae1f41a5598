use crate::error::Result;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: String,
}

/// Read-only view of the tenant's synced users schema; lets admins verify
/// custom field synchronization.
pub struct SchemaInspector {
    pool: PgPool,
    schema: Option<String>,
}

impl SchemaInspector {
    pub fn new(pool: PgPool, schema: Option<String>) -> Self {
        Self { pool, schema }
    }

    pub async fn user_columns(&self) -> Result<Vec<ColumnInfo>> {
        let schema = self.schema.as_deref().unwrap_or("public");
        let columns = sqlx::query_as::<_, ColumnInfo>(
            r#"
            SELECT column_name, data_type, is_nullable
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = 'users'
            ORDER BY ordinal_position
            "#,
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await?;
        Ok(columns)
    }

    pub async fn applied_migrations(&self) -> Result<Vec<String>> {
        let versions: Vec<String> =
            sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
                .fetch_all(&self.pool)
                .await?;
        Ok(versions)
    }
}
