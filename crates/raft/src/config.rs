use std::collections::BTreeMap;
use std::time::Duration;

/// Replication settings for one node.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// Stable node identifier within the cluster.
    pub node_id: String,

    /// Address peers use to reach this node's internal RPC routes.
    pub advertise_addr: String,

    /// Initial peer set, `node_id -> base URL`. Excludes this node.
    pub peers: BTreeMap<String, String>,

    /// Election fires between min and min+jitter after the last heartbeat.
    pub election_timeout_min: Duration,
    pub election_timeout_jitter: Duration,

    pub heartbeat_interval: Duration,

    /// Per-RPC deadline for peer calls.
    pub rpc_timeout: Duration,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            node_id: "node-1".to_string(),
            advertise_addr: "http://127.0.0.1:8080".to_string(),
            peers: BTreeMap::new(),
            election_timeout_min: Duration::from_millis(1500),
            election_timeout_jitter: Duration::from_millis(1500),
            heartbeat_interval: Duration::from_millis(300),
            rpc_timeout: Duration::from_secs(2),
        }
    }
}

impl RaftConfig {
    /// Load from environment.
    ///
    /// `HIVEJAR_PEERS` is a comma-separated list of `id=url` pairs, e.g.
    /// `node-2=http://10.0.0.2:8080,node-3=http://10.0.0.3:8080`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut peers = BTreeMap::new();
        if let Ok(raw) = std::env::var("HIVEJAR_PEERS") {
            for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
                if let Some((id, url)) = pair.split_once('=') {
                    peers.insert(id.trim().to_string(), url.trim().to_string());
                }
            }
        }

        Self {
            node_id: std::env::var("HIVEJAR_NODE_ID").unwrap_or(defaults.node_id),
            advertise_addr: std::env::var("HIVEJAR_ADVERTISE_ADDR").unwrap_or(defaults.advertise_addr),
            peers,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing_is_sane() {
        let config = RaftConfig::default();
        assert!(config.election_timeout_min > config.heartbeat_interval);
        assert!(config.election_timeout_jitter > Duration::ZERO);
    }
}
