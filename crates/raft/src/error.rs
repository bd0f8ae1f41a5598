use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaftError>;

#[derive(Debug, Error)]
pub enum RaftError {
    /// Write attempted on a non-leader; carries the leader id when known
    /// so clients can redirect.
    #[error("Not the leader{}", leader_hint(.leader_id))]
    NotLeader { leader_id: Option<String> },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Apply error: {0}")]
    Apply(#[from] hivejar_store::StoreError),

    #[error("Peer transport error: {0}")]
    Transport(String),

    #[error("Operation canceled")]
    Canceled,

    #[error("Internal raft error: {0}")]
    Internal(String),
}

fn leader_hint(leader_id: &Option<String>) -> String {
    match leader_id {
        Some(id) => format!(" (leader: {})", id),
        None => String::new(),
    }
}
