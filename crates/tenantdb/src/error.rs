use thiserror::Error;

pub type Result<T> = std::result::Result<T, TenantDbError>;

#[derive(Debug, Error)]
pub enum TenantDbError {
    /// The tenant has no configured data plane, or its database cannot be
    /// opened. Callers map this to an unavailable status.
    #[error("No database configured for tenant '{0}'")]
    NoDbForTenant(String),

    #[error("Not supported by store: {0}")]
    NotSupported(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// The migration lock could not be acquired within the wait cap.
    #[error("Migration lock busy for tenant '{0}'")]
    LockBusy(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] hivejar_store::StoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] hivejar_crypto::CryptoError),

    #[error("Operation canceled")]
    Canceled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,
}
