//! Simulated network: fixed wire delay plus failed-node message drops.

use paxchain_types::{NodeId, NET_DELAY};
use std::collections::HashSet;
use std::time::Duration;

/// Configuration for the simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// One-way delivery latency. The fixed artificial delay is part of the
    /// protocol's observable timing model, so there is no jitter.
    pub latency: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig { latency: NET_DELAY }
    }
}

/// Delivery decisions for the five-node cluster.
///
/// A node in the down set neither sends nor receives: messages are dropped
/// at delivery time, which also kills traffic that was in flight when the
/// node failed.
#[derive(Debug, Default)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    down: HashSet<NodeId>,
}

impl SimulatedNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        SimulatedNetwork {
            config,
            down: HashSet::new(),
        }
    }

    /// Mark a node as failed: all its traffic drops.
    pub fn fail(&mut self, node: NodeId) {
        self.down.insert(node);
    }

    /// Restore a node's connectivity.
    pub fn heal(&mut self, node: NodeId) {
        self.down.remove(&node);
    }

    /// Whether a node is currently down.
    pub fn is_down(&self, node: NodeId) -> bool {
        self.down.contains(&node)
    }

    /// `Some(latency)` if a message from `from` to `to` should be
    /// delivered, `None` if either endpoint is down.
    pub fn should_deliver(&self, from: NodeId, to: NodeId) -> Option<Duration> {
        if self.is_down(from) || self.is_down(to) {
            return None;
        }
        Some(self.config.latency)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}
