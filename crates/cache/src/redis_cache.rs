use crate::error::{CacheError, Result};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub url: String,
    /// Prepended to every key so tenants sharing a Redis stay isolated.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: String::new(),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| Self::default().url),
            key_prefix: std::env::var("REDIS_KEY_PREFIX").unwrap_or_default(),
        }
    }
}

/// Redis-backed cache handed to the tenant data-access facade.
#[derive(Clone)]
pub struct Cache {
    manager: ConnectionManager,
    key_prefix: String,
}

impl Cache {
    pub async fn new(config: CacheConfig) -> Result<Self> {
        let client = Client::open(config.url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self {
            manager,
            key_prefix: config.key_prefix,
        })
    }

    fn key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    /// Set a value with optional TTL (seconds)
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        let mut conn = self.manager.clone();

        match ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(self.key(key), serialized, ttl).await?,
            None => conn.set::<_, _, ()>(self.key(key), serialized).await?,
        }

        Ok(())
    }

    /// Get a value
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(self.key(key)).await?;

        match value {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(self.key(key)).await?;
        Ok(())
    }

    /// Delete all keys matching a pattern
    pub async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.manager.clone();
        let keys: Vec<String> = conn.keys(self.key(pattern)).await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let count = keys.len() as u64;
        conn.del::<_, ()>(keys).await?;
        Ok(count)
    }

    /// Ping with a deadline; infra stats and readiness call this under
    /// their own budget.
    pub async fn ping(&self, timeout: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        tokio::time::timeout(timeout, redis::cmd("PING").query_async::<()>(&mut conn))
            .await
            .map_err(|_| CacheError::PingTimeout)??;
        Ok(())
    }
}

// Helper functions for common cache key patterns
pub fn settings_cache_key(tenant_slug: &str) -> String {
    format!("settings:{}", tenant_slug)
}

pub fn jwks_cache_key(tenant_slug: &str) -> String {
    format!("jwks:{}", tenant_slug)
}

pub fn user_cache_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}
