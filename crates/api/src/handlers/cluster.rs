use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use hivejar_control::ControlError;
use hivejar_raft::{
    AppendEntriesRequest, AppendEntriesResponse, RaftStats, RequestVoteRequest,
    RequestVoteResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ---- internal replication RPCs (peer traffic only) ----

/// POST /internal/raft/append-entries
pub async fn append_entries(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AppendEntriesRequest>,
) -> Json<AppendEntriesResponse> {
    Json(state.control.raft().handle_append_entries(request))
}

/// POST /internal/raft/request-vote
pub async fn request_vote(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RequestVoteRequest>,
) -> Json<RequestVoteResponse> {
    Json(state.control.raft().handle_request_vote(request))
}

// ---- cluster administration ----

#[derive(Debug, Deserialize)]
pub struct AddPeerRequest {
    pub id: String,
    pub addr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatusResponse {
    pub node_id: String,
    pub is_leader: bool,
    pub leader_id: Option<String>,
    #[serde(flatten)]
    pub stats: RaftStats,
}

/// GET /v2/admin/cluster/status
pub async fn cluster_status(State(state): State<Arc<AppState>>) -> Json<ClusterStatusResponse> {
    let raft = state.control.raft();
    Json(ClusterStatusResponse {
        node_id: raft.node_id().to_string(),
        is_leader: raft.is_leader(),
        leader_id: raft.leader_id(),
        stats: raft.stats(),
    })
}

/// POST /v2/admin/cluster/peers (leader only)
pub async fn add_peer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddPeerRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .control
        .raft()
        .add_peer(&request.id, &request.addr)
        .map_err(|e| ApiError::from(ControlError::from(e)))?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v2/admin/cluster/peers/:id (leader only; self-removal refused)
pub async fn remove_peer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .control
        .raft()
        .remove_peer(&id)
        .map_err(|e| ApiError::from(ControlError::from(e)))?;
    Ok(StatusCode::NO_CONTENT)
}
