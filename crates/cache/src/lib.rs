pub mod error;
pub mod redis_cache;

pub use error::{CacheError, Result};
pub use redis_cache::{
    jwks_cache_key, settings_cache_key, user_cache_key, Cache, CacheConfig,
};
