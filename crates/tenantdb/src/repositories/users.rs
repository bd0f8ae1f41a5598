use crate::error::{Result, TenantDbError};
use crate::pool::DriverPool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Data-plane user row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    #[sqlx(json)]
    pub metadata: serde_json::Value,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub metadata: serde_json::Value,
}

/// User repository; available for both SQL drivers.
pub struct UserRepository {
    pool: DriverPool,
}

impl UserRepository {
    pub fn new(pool: DriverPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, new_user: &NewUser) -> Result<Uuid> {
        let id = Uuid::new_v4();
        match &self.pool {
            DriverPool::Postgres(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO users (id, email, password_hash, email_verified, metadata)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(id)
                .bind(&new_user.email)
                .bind(&new_user.password_hash)
                .bind(new_user.email_verified)
                .bind(sqlx::types::Json(&new_user.metadata))
                .execute(pool)
                .await?;
            }
            DriverPool::MySql(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO users (id, email, password_hash, email_verified, metadata)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id)
                .bind(&new_user.email)
                .bind(&new_user.password_hash)
                .bind(new_user.email_verified)
                .bind(sqlx::types::Json(&new_user.metadata))
                .execute(pool)
                .await?;
            }
        }
        Ok(id)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = match &self.pool {
            DriverPool::Postgres(pool) => {
                sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
            }
            DriverPool::MySql(pool) => {
                sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
            }
        };
        Ok(user)
    }

    /// Find user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = match &self.pool {
            DriverPool::Postgres(pool) => {
                sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                    .bind(email)
                    .fetch_optional(pool)
                    .await?
            }
            DriverPool::MySql(pool) => {
                sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
                    .bind(email)
                    .fetch_optional(pool)
                    .await?
            }
        };
        Ok(user)
    }

    /// List users (paginated, newest first)
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let users = match &self.pool {
            DriverPool::Postgres(pool) => {
                sqlx::query_as::<_, User>(
                    "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
            }
            DriverPool::MySql(pool) => {
                sqlx::query_as::<_, User>(
                    "SELECT * FROM users ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
            }
        };
        Ok(users)
    }

    /// Count users
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = match &self.pool {
            DriverPool::Postgres(pool) => {
                sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(pool).await?
            }
            DriverPool::MySql(pool) => {
                sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(pool).await?
            }
        };
        Ok(count.0)
    }

    /// Record a successful login
    pub async fn touch_last_login(&self, id: Uuid) -> Result<()> {
        match &self.pool {
            DriverPool::Postgres(pool) => {
                sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await?;
            }
            DriverPool::MySql(pool) => {
                sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
                    .bind(id)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Delete a user
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let affected = match &self.pool {
            DriverPool::Postgres(pool) => sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await?
                .rows_affected(),
            DriverPool::MySql(pool) => sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await?
                .rows_affected(),
        };
        if affected == 0 {
            return Err(TenantDbError::Sqlx(sqlx::Error::RowNotFound));
        }
        Ok(())
    }
}
