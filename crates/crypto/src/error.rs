use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Frame or encoding mismatch: wrong version byte, truncated frame,
    /// or invalid base64.
    #[error("Envelope format error: {0}")]
    Format(String),

    /// Authentication tag mismatch: the ciphertext or associated data was
    /// tampered with, or the wrong key was used.
    #[error("Envelope integrity check failed")]
    Integrity,

    #[error("Invalid master key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
