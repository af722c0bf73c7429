//! Paxos ballot identifiers.

use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A totally ordered proposal identifier `(seq, node, depth)`.
///
/// Depth is the primary comparison key: encoding the ledger position into
/// the ballot binds each Paxos instance to one slot, and lets a lagging
/// acceptor recognize a stale `PREPARE` without consulting its ledger.
/// Sequence numbers break ties within a slot, and the node id makes ballots
/// from distinct proposers never compare equal.
///
/// Serialized on the wire as the array `[seq, node, depth]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u64, u64, u64)", into = "(u64, u64, u64)")]
pub struct Ballot {
    /// Proposer-local monotonic sequence counter.
    pub seq: u64,
    /// Proposing node.
    pub node: NodeId,
    /// Ledger depth this ballot is scoped to.
    pub depth: u64,
}

impl Ballot {
    /// First ballot a node would issue for a slot.
    pub fn new(seq: u64, node: NodeId, depth: u64) -> Self {
        Ballot { seq, node, depth }
    }
}

impl Ord for Ballot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth
            .cmp(&other.depth)
            .then(self.seq.cmp(&other.seq))
            .then(self.node.cmp(&other.node))
    }
}

impl PartialOrd for Ballot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<(u64, u64, u64)> for Ballot {
    fn from((seq, node, depth): (u64, u64, u64)) -> Self {
        Ballot {
            seq,
            node: NodeId(node),
            depth,
        }
    }
}

impl From<Ballot> for (u64, u64, u64) {
    fn from(b: Ballot) -> Self {
        (b.seq, b.node.0, b.depth)
    }
}

impl fmt::Debug for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, n{}, d{})", self.seq, self.node, self.depth)
    }
}
