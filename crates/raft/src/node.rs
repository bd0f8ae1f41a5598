use crate::config::RaftConfig;
use crate::error::{RaftError, Result};
use crate::log::{LogEntry, WalLog};
use crate::rpc::{
    AppendEntriesRequest, AppendEntriesResponse, PeerClient, RequestVoteRequest,
    RequestVoteResponse,
};
use hivejar_models::Mutation;
use hivejar_store::ConfigStore;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// Point-in-time replication health, surfaced on readiness endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RaftStats {
    pub term: u64,
    pub commit_index: u64,
    pub applied_index: u64,
    pub num_peers: usize,
    pub healthy: bool,
}

struct NodeState {
    role: Role,
    leader_id: Option<String>,
    peers: BTreeMap<String, String>,
    next_index: BTreeMap<String, u64>,
    match_index: BTreeMap<String, u64>,
    election_deadline: Instant,
}

/// One replica of the replicated mutation log.
///
/// The leader accepts mutations, appends them to its durable log, ships
/// them to followers, and applies committed entries to the local config
/// store; followers apply the identical entries, so every replica's store
/// converges byte-for-byte.
pub struct RaftNode {
    config: RaftConfig,
    store: Arc<ConfigStore>,
    state: Mutex<NodeState>,
    log: Mutex<WalLog>,
    commit_index: AtomicU64,
    applied_index: AtomicU64,
    applied_tx: watch::Sender<u64>,
    client: PeerClient,
}

impl RaftNode {
    pub fn new(
        config: RaftConfig,
        store: Arc<ConfigStore>,
        log_dir: impl AsRef<Path>,
    ) -> Result<Arc<Self>> {
        let log = WalLog::open(log_dir)?;
        let saved_commit = log.saved_commit_index().min(log.last_index());

        let (applied_tx, _) = watch::channel(0);
        let deadline = Instant::now() + config.election_timeout_min;
        let node = Arc::new(Self {
            client: PeerClient::new(config.rpc_timeout),
            state: Mutex::new(NodeState {
                role: Role::Follower,
                leader_id: None,
                peers: config.peers.clone(),
                next_index: BTreeMap::new(),
                match_index: BTreeMap::new(),
                election_deadline: deadline,
            }),
            config,
            store,
            log: Mutex::new(log),
            commit_index: AtomicU64::new(saved_commit),
            applied_index: AtomicU64::new(0),
            applied_tx,
        });

        // Replay entries committed before the restart.
        node.apply_committed()?;
        Ok(node)
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn is_leader(&self) -> bool {
        self.state().role == Role::Leader
    }

    pub fn leader_id(&self) -> Option<String> {
        self.state().leader_id.clone()
    }

    pub fn stats(&self) -> RaftStats {
        let term = self.log.lock().expect("raft log lock").current_term();
        let state = self.state();
        RaftStats {
            term,
            commit_index: self.commit_index.load(Ordering::Acquire),
            applied_index: self.applied_index.load(Ordering::Acquire),
            num_peers: state.peers.len(),
            healthy: state.leader_id.is_some() || state.role == Role::Leader,
        }
    }

    /// Fail unless this node is the leader; used by every admin write
    /// path before any work happens.
    pub fn require_leader(&self) -> Result<()> {
        let state = self.state();
        if state.role == Role::Leader {
            Ok(())
        } else {
            Err(RaftError::NotLeader {
                leader_id: state.leader_id.clone(),
            })
        }
    }

    /// Submit a mutation for replication. Returns once the entry is
    /// committed and applied locally, so a follow-up read on this node
    /// observes the write.
    pub async fn submit(&self, mutation: Mutation) -> Result<LogEntry> {
        let (entry, term) = {
            let state = self.state();
            if state.role != Role::Leader {
                return Err(RaftError::NotLeader {
                    leader_id: state.leader_id.clone(),
                });
            }
            drop(state);

            let mut log = self.log.lock().expect("raft log lock");
            let term = log.current_term();
            let entry = log.append(term, mutation)?;
            (entry, term)
        };

        // A lagging follower can need a catch-up round before its match
        // index covers the new entry; retry briefly before giving up.
        let mut committed = false;
        for round in 0..10 {
            self.replicate_once(term).await?;
            if self.commit_index.load(Ordering::Acquire) >= entry.index {
                committed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(25 * (round + 1))).await;
        }
        if !committed {
            return Err(RaftError::Transport(
                "failed to reach quorum for commit".to_string(),
            ));
        }

        // Commit advanced synchronously above, so local apply already ran.
        let mut applied_rx = self.applied_tx.subscribe();
        while *applied_rx.borrow() < entry.index {
            applied_rx
                .changed()
                .await
                .map_err(|_| RaftError::Canceled)?;
        }

        Ok(entry)
    }

    // ---- peer management (leader-only) ----

    pub fn add_peer(&self, id: &str, addr: &str) -> Result<()> {
        self.require_leader()?;
        if id == self.config.node_id {
            return Err(RaftError::Conflict(
                "a node cannot add itself as a peer".to_string(),
            ));
        }

        let last_index = self.log.lock().expect("raft log lock").last_index();
        let mut state = self.state();
        state.peers.insert(id.to_string(), addr.to_string());
        state.next_index.insert(id.to_string(), last_index + 1);
        state.match_index.insert(id.to_string(), 0);
        tracing::info!("Peer added: {} at {}", id, addr);
        Ok(())
    }

    pub fn remove_peer(&self, id: &str) -> Result<()> {
        self.require_leader()?;
        if id == self.config.node_id {
            return Err(RaftError::Conflict(
                "a node cannot remove itself from the cluster".to_string(),
            ));
        }

        let mut state = self.state();
        if state.peers.remove(id).is_none() {
            return Err(RaftError::Conflict(format!("unknown peer '{}'", id)));
        }
        state.next_index.remove(id);
        state.match_index.remove(id);
        tracing::info!("Peer removed: {}", id);
        Ok(())
    }

    // ---- incoming RPCs ----

    pub fn handle_append_entries(&self, request: AppendEntriesRequest) -> AppendEntriesResponse {
        let mut log = self.log.lock().expect("raft log lock");
        let current_term = log.current_term();

        if request.term < current_term {
            return AppendEntriesResponse {
                term: current_term,
                success: false,
                match_index: 0,
            };
        }

        if request.term > current_term {
            if let Err(e) = log.save_vote(request.term, None) {
                tracing::error!("Failed to persist term transition: {}", e);
            }
        }

        {
            let mut state = self.state();
            state.role = Role::Follower;
            state.leader_id = Some(request.leader_id.clone());
            state.election_deadline = Instant::now() + self.random_election_timeout();
        }

        // Consistency check on the entry preceding the new ones.
        let prev_ok = match log.term_at(request.prev_log_index) {
            Some(term) => term == request.prev_log_term,
            None => false,
        };
        if !prev_ok {
            return AppendEntriesResponse {
                term: log.current_term(),
                success: false,
                match_index: 0,
            };
        }

        if let Err(e) = log.install(request.prev_log_index, request.entries) {
            tracing::error!("Failed to install replicated entries: {}", e);
            return AppendEntriesResponse {
                term: log.current_term(),
                success: false,
                match_index: 0,
            };
        }

        let last_index = log.last_index();
        let new_commit = request.leader_commit.min(last_index);
        if new_commit > self.commit_index.load(Ordering::Acquire) {
            self.commit_index.store(new_commit, Ordering::Release);
            if let Err(e) = log.save_commit_index(new_commit) {
                tracing::warn!("Failed to persist commit index: {}", e);
            }
        }
        let term = log.current_term();
        drop(log);

        if let Err(e) = self.apply_committed() {
            tracing::error!("Apply failed on follower: {}", e);
        }

        AppendEntriesResponse {
            term,
            success: true,
            match_index: last_index,
        }
    }

    pub fn handle_request_vote(&self, request: RequestVoteRequest) -> RequestVoteResponse {
        let mut log = self.log.lock().expect("raft log lock");
        let current_term = log.current_term();

        if request.term < current_term {
            return RequestVoteResponse {
                term: current_term,
                vote_granted: false,
            };
        }

        if request.term > current_term {
            if let Err(e) = log.save_vote(request.term, None) {
                tracing::error!("Failed to persist term transition: {}", e);
            }
            let mut state = self.state();
            state.role = Role::Follower;
            state.leader_id = None;
        }

        let already_voted = log
            .voted_for()
            .is_some_and(|v| v != request.candidate_id);

        // A candidate with a stale log cannot win our vote.
        let log_up_to_date = request.last_log_term > log.last_term()
            || (request.last_log_term == log.last_term()
                && request.last_log_index >= log.last_index());

        let grant = !already_voted && log_up_to_date;
        if grant {
            if let Err(e) = log.save_vote(request.term, Some(request.candidate_id.clone())) {
                tracing::error!("Failed to persist vote: {}", e);
                return RequestVoteResponse {
                    term: log.current_term(),
                    vote_granted: false,
                };
            }
            let mut state = self.state();
            state.election_deadline = Instant::now() + self.random_election_timeout();
        }

        RequestVoteResponse {
            term: log.current_term(),
            vote_granted: grant,
        }
    }

    // ---- background driver ----

    /// Spawn the election/heartbeat ticker. Runs until the process exits;
    /// these are the replication layer's only background tasks.
    pub fn run(self: &Arc<Self>) {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let tick = Duration::from_millis(50);
            loop {
                tokio::time::sleep(tick).await;

                let (role, deadline) = {
                    let state = node.state();
                    (state.role, state.election_deadline)
                };

                match role {
                    Role::Leader => {
                        let term = node.log.lock().expect("raft log lock").current_term();
                        if let Err(e) = node.replicate_once(term).await {
                            tracing::debug!("Heartbeat round incomplete: {}", e);
                        }
                        tokio::time::sleep(node.config.heartbeat_interval).await;
                    }
                    Role::Follower | Role::Candidate => {
                        if Instant::now() >= deadline {
                            node.start_election().await;
                        }
                    }
                }
            }
        });
    }

    async fn start_election(self: &Arc<Self>) {
        let (term, last_log_index, last_log_term, peers) = {
            let mut log = self.log.lock().expect("raft log lock");
            let term = log.current_term() + 1;
            if let Err(e) = log.save_vote(term, Some(self.config.node_id.clone())) {
                tracing::error!("Failed to persist candidacy: {}", e);
                return;
            }

            let mut state = self.state();
            state.role = Role::Candidate;
            state.leader_id = None;
            state.election_deadline = Instant::now() + self.random_election_timeout();
            (term, log.last_index(), log.last_term(), state.peers.clone())
        };

        tracing::info!(
            "Election started: node={} term={}",
            self.config.node_id,
            term
        );

        let quorum = (peers.len() + 1) / 2 + 1;
        let mut votes = 1usize; // own vote

        let request = RequestVoteRequest {
            term,
            candidate_id: self.config.node_id.clone(),
            last_log_index,
            last_log_term,
        };

        let mut handles = Vec::new();
        for (peer_id, peer_addr) in peers {
            let client = self.client.clone();
            let request = request.clone();
            handles.push(tokio::spawn(async move {
                (peer_id, client.request_vote(&peer_addr, &request).await)
            }));
        }

        for handle in handles {
            let Ok((peer_id, result)) = handle.await else {
                continue;
            };
            match result {
                Ok(response) if response.vote_granted => votes += 1,
                Ok(response) => {
                    if response.term > term {
                        self.step_down(response.term);
                        return;
                    }
                }
                Err(e) => tracing::debug!("Vote request to {} failed: {}", peer_id, e),
            }
        }

        if votes >= quorum {
            self.become_leader(term);
        }
    }

    fn become_leader(self: &Arc<Self>, term: u64) {
        let (current_term, last_index) = {
            let log = self.log.lock().expect("raft log lock");
            (log.current_term(), log.last_index())
        };
        // Another node may have won this term in the meantime.
        if current_term != term {
            return;
        }
        {
            let mut state = self.state();
            if state.role != Role::Candidate {
                return;
            }
            state.role = Role::Leader;
            state.leader_id = Some(self.config.node_id.clone());
            let peer_ids: Vec<String> = state.peers.keys().cloned().collect();
            for id in peer_ids {
                state.next_index.insert(id.clone(), last_index + 1);
                state.match_index.insert(id, 0);
            }
        }
        tracing::info!("Leadership acquired: node={} term={}", self.config.node_id, term);

        // Announce immediately rather than waiting for the next tick.
        let node = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = node.replicate_once(term).await {
                tracing::debug!("Initial heartbeat incomplete: {}", e);
            }
        });
    }

    fn step_down(&self, term: u64) {
        let mut log = self.log.lock().expect("raft log lock");
        if term > log.current_term() {
            if let Err(e) = log.save_vote(term, None) {
                tracing::error!("Failed to persist term transition: {}", e);
            }
        }
        drop(log);

        let mut state = self.state();
        if state.role != Role::Follower {
            tracing::info!("Stepping down: node={} term={}", self.config.node_id, term);
        }
        state.role = Role::Follower;
        state.leader_id = None;
        state.election_deadline = Instant::now() + self.random_election_timeout();
    }

    /// One replication round: ship pending entries (or heartbeats) to all
    /// peers, advance the commit index on majority match, apply.
    async fn replicate_once(&self, term: u64) -> Result<()> {
        let peers = {
            let state = self.state();
            if state.role != Role::Leader {
                return Err(RaftError::NotLeader {
                    leader_id: state.leader_id.clone(),
                });
            }
            state.peers.clone()
        };

        if peers.is_empty() {
            // Single-node cluster: everything in the log is committed.
            let last = self.log.lock().expect("raft log lock").last_index();
            self.advance_commit_to(last)?;
            return Ok(());
        }

        let commit = self.commit_index.load(Ordering::Acquire);
        let mut handles = Vec::new();
        for (peer_id, peer_addr) in peers {
            let next = {
                let state = self.state();
                *state.next_index.get(&peer_id).unwrap_or(&1)
            };
            let (prev_log_index, prev_log_term, entries) = {
                let log = self.log.lock().expect("raft log lock");
                let prev = next.saturating_sub(1);
                (
                    prev,
                    log.term_at(prev).unwrap_or(0),
                    log.entries_after(prev),
                )
            };
            let request = AppendEntriesRequest {
                term,
                leader_id: self.config.node_id.clone(),
                prev_log_index,
                prev_log_term,
                entries,
                leader_commit: commit,
            };
            let client = self.client.clone();
            handles.push(tokio::spawn(async move {
                (peer_id, client.append_entries(&peer_addr, &request).await)
            }));
        }

        for handle in handles {
            let Ok((peer_id, result)) = handle.await else {
                continue;
            };
            match result {
                Ok(response) if response.success => {
                    let mut state = self.state();
                    state.match_index.insert(peer_id.clone(), response.match_index);
                    state.next_index.insert(peer_id, response.match_index + 1);
                }
                Ok(response) => {
                    if response.term > term {
                        self.step_down(response.term);
                        return Err(RaftError::NotLeader { leader_id: None });
                    }
                    // Log mismatch: back up and retry on the next round.
                    let mut state = self.state();
                    let next = state.next_index.entry(peer_id).or_insert(1);
                    *next = next.saturating_sub(1).max(1);
                }
                Err(e) => tracing::debug!("Append to {} failed: {}", peer_id, e),
            }
        }

        self.advance_commit_from_matches(term)
    }

    fn advance_commit_from_matches(&self, term: u64) -> Result<()> {
        let last_index = self.log.lock().expect("raft log lock").last_index();
        let candidate = {
            let state = self.state();
            let mut matches: Vec<u64> = state.match_index.values().copied().collect();
            matches.push(last_index);
            matches.sort_unstable();
            // matches[(n-1)/2] is the highest index replicated on a
            // majority of the cluster.
            let cluster = matches.len();
            matches[(cluster - 1) / 2]
        };

        // Only entries from the current term commit by counting.
        let candidate_term = self
            .log
            .lock()
            .expect("raft log lock")
            .term_at(candidate)
            .unwrap_or(0);
        if candidate_term == term {
            self.advance_commit_to(candidate)?;
        }
        Ok(())
    }

    fn advance_commit_to(&self, index: u64) -> Result<()> {
        let current = self.commit_index.load(Ordering::Acquire);
        if index > current {
            self.commit_index.store(index, Ordering::Release);
            let mut log = self.log.lock().expect("raft log lock");
            if let Err(e) = log.save_commit_index(index) {
                tracing::warn!("Failed to persist commit index: {}", e);
            }
            drop(log);
            self.apply_committed()?;
        }
        Ok(())
    }

    /// Apply every committed-but-unapplied entry to the config store, in
    /// order.
    fn apply_committed(&self) -> Result<()> {
        loop {
            let applied = self.applied_index.load(Ordering::Acquire);
            let commit = self.commit_index.load(Ordering::Acquire);
            if applied >= commit {
                return Ok(());
            }

            let next = applied + 1;
            let entry = {
                let log = self.log.lock().expect("raft log lock");
                log.entry_at(next).cloned()
            };
            let Some(entry) = entry else {
                return Err(RaftError::Internal(format!(
                    "committed entry {} missing from log",
                    next
                )));
            };

            crate::apply::apply_mutation(&self.store, &entry.mutation)?;
            self.applied_index.store(next, Ordering::Release);
            let _ = self.applied_tx.send(next);
        }
    }

    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().expect("raft state lock")
    }

    fn random_election_timeout(&self) -> Duration {
        let jitter_ms = self.config.election_timeout_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ms)
        };
        self.config.election_timeout_min + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivejar_models::MutationType;

    fn test_config(node_id: &str) -> RaftConfig {
        RaftConfig {
            node_id: node_id.to_string(),
            election_timeout_min: Duration::from_millis(50),
            election_timeout_jitter: Duration::from_millis(50),
            heartbeat_interval: Duration::from_millis(20),
            ..RaftConfig::default()
        }
    }

    fn mutation(slug: &str) -> Mutation {
        let tenant = serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "slug": slug,
            "name": "Acme",
            "displayName": "",
            "language": "en",
            "settings": {
                "issuerMode": "global",
                "sessionTtlSeconds": 3600,
                "mfaEnabled": false,
                "socialLoginEnabled": false,
                "security": {
                    "passwordMinLength": 8,
                    "maxLoginAttempts": 5,
                    "lockoutDurationMinutes": 15
                },
                "consent": {"skipForTrustedClients": false, "rememberDays": 365}
            },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        Mutation {
            mutation_type: MutationType::UpsertTenant,
            tenant_slug: slug.to_string(),
            ts_unix: 1_700_000_000,
            payload: tenant,
        }
    }

    fn new_node(node_id: &str) -> (Arc<RaftNode>, Arc<ConfigStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path().join("store")).unwrap());
        let node = RaftNode::new(test_config(node_id), store.clone(), dir.path().join("raft")).unwrap();
        (node, store, dir)
    }

    #[tokio::test]
    async fn test_follower_rejects_submit_with_not_leader() {
        let (node, _store, _dir) = new_node("node-1");
        let err = node.submit(mutation("acme")).await.unwrap_err();
        assert!(matches!(err, RaftError::NotLeader { .. }));
    }

    #[tokio::test]
    async fn test_single_node_elects_itself_and_applies() {
        let (node, store, _dir) = new_node("node-1");
        node.run();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !node.is_leader() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("single node should elect itself");

        let entry = node.submit(mutation("acme")).await.unwrap();
        assert_eq!(entry.index, 1);
        assert!(store.get_tenant("acme").unwrap().is_some());

        let stats = node.stats();
        assert_eq!(stats.commit_index, 1);
        assert_eq!(stats.applied_index, 1);
        assert!(stats.healthy);
        assert_eq!(node.leader_id().as_deref(), Some("node-1"));
    }

    #[tokio::test]
    async fn test_follower_applies_replicated_entries() {
        let (leader, leader_store, _dir_a) = new_node("node-1");
        let (follower, follower_store, _dir_b) = new_node("node-2");

        // Drive the leader without networking by handing its entries to
        // the follower's RPC handler directly.
        leader.run();
        while !leader.is_leader() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let entry = leader.submit(mutation("acme")).await.unwrap();

        let response = follower.handle_append_entries(AppendEntriesRequest {
            term: 5,
            leader_id: "node-1".to_string(),
            prev_log_index: 0,
            prev_log_term: 0,
            entries: vec![entry],
            leader_commit: 1,
        });
        assert!(response.success);
        assert_eq!(response.match_index, 1);

        let from_leader = leader_store.get_tenant("acme").unwrap().unwrap();
        let from_follower = follower_store.get_tenant("acme").unwrap().unwrap();
        assert_eq!(from_leader, from_follower);
        assert!(!follower.is_leader());
        assert_eq!(follower.leader_id().as_deref(), Some("node-1"));
    }

    #[tokio::test]
    async fn test_append_entries_rejects_stale_term() {
        let (node, _store, _dir) = new_node("node-1");

        // Bump our term past the incoming request's.
        node.handle_request_vote(RequestVoteRequest {
            term: 10,
            candidate_id: "node-9".to_string(),
            last_log_index: 0,
            last_log_term: 0,
        });

        let response = node.handle_append_entries(AppendEntriesRequest {
            term: 3,
            leader_id: "node-2".to_string(),
            prev_log_index: 0,
            prev_log_term: 0,
            entries: vec![],
            leader_commit: 0,
        });
        assert!(!response.success);
        assert_eq!(response.term, 10);
    }

    #[tokio::test]
    async fn test_vote_granted_once_per_term() {
        let (node, _store, _dir) = new_node("node-1");

        let first = node.handle_request_vote(RequestVoteRequest {
            term: 2,
            candidate_id: "node-2".to_string(),
            last_log_index: 0,
            last_log_term: 0,
        });
        assert!(first.vote_granted);

        let second = node.handle_request_vote(RequestVoteRequest {
            term: 2,
            candidate_id: "node-3".to_string(),
            last_log_index: 0,
            last_log_term: 0,
        });
        assert!(!second.vote_granted);
    }

    #[tokio::test]
    async fn test_vote_denied_for_stale_log() {
        let (node, _store, _dir) = new_node("node-1");
        node.run();
        while !node.is_leader() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        node.submit(mutation("acme")).await.unwrap();

        let response = node.handle_request_vote(RequestVoteRequest {
            term: 99,
            candidate_id: "node-2".to_string(),
            last_log_index: 0,
            last_log_term: 0,
        });
        assert!(!response.vote_granted);
    }

    #[tokio::test]
    async fn test_self_removal_refused() {
        let (node, _store, _dir) = new_node("node-1");
        node.run();
        while !node.is_leader() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let err = node.remove_peer("node-1").unwrap_err();
        assert!(matches!(err, RaftError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_peer_management_leader_only() {
        let (node, _store, _dir) = new_node("node-1");

        // Still a follower: no ticker running.
        let err = node.add_peer("node-2", "http://127.0.0.1:9999").unwrap_err();
        assert!(matches!(err, RaftError::NotLeader { .. }));

        node.run();
        while !node.is_leader() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        node.add_peer("node-2", "http://127.0.0.1:9999").unwrap();
        assert_eq!(node.stats().num_peers, 1);
        node.remove_peer("node-2").unwrap();
        assert_eq!(node.stats().num_peers, 0);
    }
}
