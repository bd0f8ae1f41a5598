use hivejar_crypto::CryptoError;
use hivejar_keys::KeyError;
use hivejar_raft::RaftError;
use hivejar_store::StoreError;
use hivejar_tenantdb::TenantDbError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ControlError>;

/// Control-plane error taxonomy, carried end-to-end as variants; the HTTP
/// layer maps each kind to a fixed status without inspecting messages.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed: settings changed since read")]
    PreconditionFailed,

    #[error("Operation must be performed on the leader{}", leader_hint(.leader_id))]
    NotLeader { leader_id: Option<String> },

    #[error("No database configured for tenant '{0}'")]
    NoDbForTenant(String),

    #[error("Not supported by store: {0}")]
    NotSupported(String),

    #[error("Migration lock busy for tenant '{0}'")]
    LockBusy(String),

    #[error("Envelope integrity check failed")]
    CryptoIntegrity,

    #[error("Envelope format error: {0}")]
    CryptoFormat(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Operation canceled")]
    Canceled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

fn leader_hint(leader_id: &Option<String>) -> String {
    match leader_id {
        Some(id) => format!(" (leader: {})", id),
        None => String::new(),
    }
}

impl From<StoreError> for ControlError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ControlError::NotFound(what),
            StoreError::Crypto(e) => e.into(),
            StoreError::Io(e) => {
                ControlError::ServiceUnavailable(format!("config store degraded: {}", e))
            }
            StoreError::Serialization(e) => ControlError::Internal(e.to_string()),
            StoreError::PlaintextSecrets(slug) => {
                ControlError::Internal(format!("unencrypted secrets for tenant '{}'", slug))
            }
        }
    }
}

impl From<CryptoError> for ControlError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Integrity => ControlError::CryptoIntegrity,
            CryptoError::Format(msg) => ControlError::CryptoFormat(msg),
            CryptoError::InvalidKey(msg) => ControlError::Internal(msg),
            CryptoError::Serialization(e) => ControlError::Internal(e.to_string()),
        }
    }
}

impl From<RaftError> for ControlError {
    fn from(err: RaftError) -> Self {
        match err {
            RaftError::NotLeader { leader_id } => ControlError::NotLeader { leader_id },
            RaftError::Conflict(msg) => ControlError::Conflict(msg),
            RaftError::Canceled => ControlError::Canceled,
            RaftError::Transport(msg) => ControlError::ServiceUnavailable(msg),
            RaftError::Apply(e) => e.into(),
            other => ControlError::Internal(other.to_string()),
        }
    }
}

impl From<KeyError> for ControlError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::NoKey(slug) => ControlError::NotFound(format!("signing key for '{}'", slug)),
            KeyError::Store(e) => e.into(),
            other => ControlError::Internal(other.to_string()),
        }
    }
}

impl From<TenantDbError> for ControlError {
    fn from(err: TenantDbError) -> Self {
        match err {
            TenantDbError::NoDbForTenant(slug) => ControlError::NoDbForTenant(slug),
            TenantDbError::NotSupported(msg) => ControlError::NotSupported(msg),
            TenantDbError::TenantNotFound(slug) => {
                ControlError::NotFound(format!("tenant '{}'", slug))
            }
            TenantDbError::LockBusy(slug) => ControlError::LockBusy(slug),
            TenantDbError::Canceled => ControlError::Canceled,
            TenantDbError::DeadlineExceeded => ControlError::DeadlineExceeded,
            TenantDbError::Store(e) => e.into(),
            TenantDbError::Crypto(e) => e.into(),
            other => ControlError::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ControlError {
    fn from(err: validator::ValidationErrors) -> Self {
        ControlError::InvalidInput(err.to_string())
    }
}
