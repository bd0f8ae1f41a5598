use crate::error::{RaftError, Result};
use crate::log::LogEntry;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Log replication / heartbeat RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    pub term: u64,
    pub leader_id: String,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<LogEntry>,
    pub leader_commit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub term: u64,
    pub success: bool,
    /// Highest index stored on the follower when `success`; lets the
    /// leader advance `match_index` without bookkeeping races.
    pub match_index: u64,
}

/// Leader election RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestVoteRequest {
    pub term: u64,
    pub candidate_id: String,
    pub last_log_index: u64,
    pub last_log_term: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestVoteResponse {
    pub term: u64,
    pub vote_granted: bool,
}

/// HTTP client for peer RPCs. Peers expose the internal raft routes on
/// their admin listener.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new(rpc_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(rpc_timeout)
            .build()
            .expect("reqwest client");
        Self { http }
    }

    pub async fn append_entries(
        &self,
        base_url: &str,
        request: &AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse> {
        self.post(base_url, "/internal/raft/append-entries", request).await
    }

    pub async fn request_vote(
        &self,
        base_url: &str,
        request: &RequestVoteRequest,
    ) -> Result<RequestVoteResponse> {
        self.post(base_url, "/internal/raft/request-vote", request).await
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        base_url: &str,
        path: &str,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| RaftError::Transport(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(RaftError::Transport(format!(
                "{}: status {}",
                url,
                response.status()
            )));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| RaftError::Transport(format!("{}: {}", url, e)))
    }
}
