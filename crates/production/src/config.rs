//! Static peer configuration.
//!
//! A TOML file maps each node id to its listen address. Loaded once at
//! startup; there is no reload.
//!
//! ```toml
//! [peers]
//! 1 = "127.0.0.1:7101"
//! 2 = "127.0.0.1:7102"
//! 3 = "127.0.0.1:7103"
//! 4 = "127.0.0.1:7104"
//! 5 = "127.0.0.1:7105"
//! ```

use paxchain_types::{all_nodes, NodeId};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Errors loading or validating the peer map.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("peer key {0:?} is not a node id")]
    BadNodeId(String),

    #[error("peer {node} has invalid address {addr:?}")]
    BadAddr { node: NodeId, addr: String },

    #[error("config is missing node {0}")]
    MissingNode(NodeId),

    #[error("config names unexpected node {0}")]
    UnexpectedNode(NodeId),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    peers: BTreeMap<String, String>,
}

/// The validated `node_id → address` map for the five-node cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    peers: BTreeMap<NodeId, SocketAddr>,
}

impl ClusterConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    /// A peer's address.
    pub fn addr(&self, node: NodeId) -> Option<SocketAddr> {
        self.peers.get(&node).copied()
    }

    /// All configured peers.
    pub fn peers(&self) -> &BTreeMap<NodeId, SocketAddr> {
        &self.peers
    }
}

impl std::str::FromStr for ClusterConfig {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let raw: RawConfig = toml::from_str(text)?;
        let mut peers = BTreeMap::new();
        for (key, addr) in raw.peers {
            let id: u64 = key.parse().map_err(|_| ConfigError::BadNodeId(key.clone()))?;
            let node = NodeId(id);
            let addr: SocketAddr = addr.parse().map_err(|_| ConfigError::BadAddr {
                node,
                addr: addr.clone(),
            })?;
            peers.insert(node, addr);
        }
        for node in all_nodes() {
            if !peers.contains_key(&node) {
                return Err(ConfigError::MissingNode(node));
            }
        }
        if let Some(&extra) = peers.keys().find(|n| n.0 == 0 || n.0 > 5) {
            return Err(ConfigError::UnexpectedNode(extra));
        }
        Ok(ClusterConfig { peers })
    }
}
