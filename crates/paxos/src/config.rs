//! Paxos engine configuration.

use paxchain_types::PROPOSAL_TIMEOUT;
use std::time::Duration;

/// Tunable knobs for the slot engine.
#[derive(Debug, Clone)]
pub struct PaxosConfig {
    /// How long a proposer waits for its round to resolve before retrying
    /// with a higher ballot. Should comfortably exceed two network round
    /// trips (4 × NET_DELAY) plus processing.
    pub proposal_timeout: Duration,
}

impl Default for PaxosConfig {
    fn default() -> Self {
        PaxosConfig {
            proposal_timeout: PROPOSAL_TIMEOUT,
        }
    }
}
