//! Configurations for single node or local cluster.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_name: String,
    /// Trigger endpoint listen address.
    pub server_addr: String,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Size of the acceptor set; quorum is a strict majority of it.
    pub total_acceptors: usize,
    /// Rounds per phase before an attempt gives up.
    pub max_retry: usize,
    /// Overall deadline for one externally triggered attempt.
    pub propose_deadline_ms: u64,
    /// How many replicas this process boots on the in-memory bus. A real
    /// broker deployment runs one per process instead.
    pub local_replicas: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            node_name: format!("replica-0"),
            server_addr: format!("127.0.0.1:12340"),
            cluster: ClusterConfig {
                total_acceptors: 5,
                max_retry: 3,
                propose_deadline_ms: 1_000,
                local_replicas: 5,
            },
        }
    }
}
