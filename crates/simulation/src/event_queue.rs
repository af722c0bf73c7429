//! Deterministic event ordering.

use paxchain_core::{Event, EventPriority};
use paxchain_types::NodeId;
use std::time::Duration;

/// Total order over queued events: time, then priority, then target node,
/// then insertion sequence. The sequence term makes every key unique, so a
/// `BTreeMap` keyed by `EventKey` is a deterministic priority queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    /// Simulated delivery time.
    pub time: Duration,
    /// Priority band within the timestamp.
    pub priority: EventPriority,
    /// Target node.
    pub node: NodeId,
    /// Insertion sequence, for uniqueness.
    pub seq: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, node: NodeId, seq: u64) -> Self {
        EventKey {
            time,
            priority: event.priority(),
            node,
            seq,
        }
    }
}
