use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Consent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct ConsentRepository {
    pool: PgPool,
}

impl ConsentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grant (or extend) a user's consent for a client.
    pub async fn grant(
        &self,
        user_id: Uuid,
        client_id: &str,
        scopes: &[String],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Consent> {
        let consent = sqlx::query_as::<_, Consent>(
            r#"
            INSERT INTO consents (id, user_id, client_id, scopes, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, client_id)
            DO UPDATE SET scopes = EXCLUDED.scopes,
                          granted_at = now(),
                          expires_at = EXCLUDED.expires_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(client_id)
        .bind(scopes)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(consent)
    }

    pub async fn find(&self, user_id: Uuid, client_id: &str) -> Result<Option<Consent>> {
        let consent = sqlx::query_as::<_, Consent>(
            r#"
            SELECT * FROM consents
            WHERE user_id = $1 AND client_id = $2
              AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(consent)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Consent>> {
        let consents = sqlx::query_as::<_, Consent>(
            "SELECT * FROM consents WHERE user_id = $1 ORDER BY granted_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(consents)
    }

    pub async fn revoke(&self, user_id: Uuid, client_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM consents WHERE user_id = $1 AND client_id = $2")
            .bind(user_id)
            .bind(client_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
