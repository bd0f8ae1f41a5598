pub mod apply;
pub mod config;
pub mod error;
pub mod log;
pub mod node;
pub mod rpc;

pub use apply::apply_mutation;
pub use config::RaftConfig;
pub use error::{RaftError, Result};
pub use log::{LogEntry, WalLog};
pub use node::{RaftNode, RaftStats, Role};
pub use rpc::{
    AppendEntriesRequest, AppendEntriesResponse, RequestVoteRequest, RequestVoteResponse,
};
