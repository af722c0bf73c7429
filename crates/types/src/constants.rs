//! Protocol constants.

use crate::NodeId;
use std::time::Duration;

/// Fixed cluster size.
pub const NUM_NODES: u64 = 5;

/// Starting balance of every account. There is no genesis block; initial
/// money exists by fiat.
pub const INITIAL_BALANCE: u64 = 100;

/// Quorum size: any majority of the five peers.
pub const MAJORITY: usize = NUM_NODES as usize / 2 + 1;

/// Artificial one-way delivery latency applied to every outbound message.
/// Part of the observable timing model: it is what makes concurrent-proposer
/// races reproducible.
pub const NET_DELAY: Duration = Duration::from_secs(3);

/// How long a proposer waits for its round to resolve before retrying with
/// a higher ballot.
pub const PROPOSAL_TIMEOUT: Duration = Duration::from_secs(20);

/// How long a recovering node collects `LEDGER_RESPONSE` messages before
/// picking the longest valid chain.
pub const CATCHUP_WINDOW: Duration = Duration::from_secs(8);

/// Length of the alphanumeric proof-of-work nonce.
pub const NONCE_LEN: usize = 8;

/// All node ids in the cluster.
pub fn all_nodes() -> impl Iterator<Item = NodeId> {
    (1..=NUM_NODES).map(NodeId)
}

/// All node ids except `me`.
pub fn peers_of(me: NodeId) -> impl Iterator<Item = NodeId> {
    all_nodes().filter(move |&n| n != me)
}
