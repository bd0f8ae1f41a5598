use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] hivejar_crypto::CryptoError),

    /// Settings carrying plaintext secrets reached the persistence layer;
    /// secrets must be envelope-encrypted before a mutation is emitted so
    /// every replica writes identical bytes.
    #[error("Refusing to persist plaintext secrets for tenant '{0}'")]
    PlaintextSecrets(String),

    #[error("Entity not found: {0}")]
    NotFound(String),
}
