use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeyError>;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key generation error: {0}")]
    Generation(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Store error: {0}")]
    Store(#[from] hivejar_store::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No signing key for tenant '{0}'")]
    NoKey(String),
}

impl From<hivejar_crypto::CryptoError> for KeyError {
    fn from(err: hivejar_crypto::CryptoError) -> Self {
        KeyError::Generation(err.to_string())
    }
}

impl From<rsa::Error> for KeyError {
    fn from(err: rsa::Error) -> Self {
        KeyError::Generation(err.to_string())
    }
}

impl From<rsa::pkcs8::Error> for KeyError {
    fn from(err: rsa::pkcs8::Error) -> Self {
        KeyError::Generation(err.to_string())
    }
}
