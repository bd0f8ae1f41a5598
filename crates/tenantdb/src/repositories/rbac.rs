use crate::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Role assignments in the data plane. Role definitions live in the
/// control plane; this repository only maps users to role names.
pub struct RbacRepository {
    pool: PgPool,
}

impl RbacRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn assign(&self, user_id: Uuid, role_name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_name) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn unassign(&self, user_id: Uuid, role_name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_name = $2")
            .bind(user_id)
            .bind(role_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<String>> {
        let roles: Vec<String> = sqlx::query_scalar(
            "SELECT role_name FROM user_roles WHERE user_id = $1 ORDER BY role_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    pub async fn users_with_role(&self, role_name: &str) -> Result<Vec<Uuid>> {
        let users: Vec<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM user_roles WHERE role_name = $1 ORDER BY user_id",
        )
        .bind(role_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
