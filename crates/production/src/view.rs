//! Shared read model for the console.
//!
//! The state machine is owned by the runner task; reads (`printBlockchain`,
//! `printBalance`) are served from this view, which the runner refreshes
//! whenever the ledger changes. This keeps the console off the event loop's
//! critical section entirely.

use parking_lot::RwLock;
use paxchain_types::{Block, LedgerSnapshot, NodeId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only mirror of a node's observable state.
#[derive(Debug, Default)]
pub struct ChainView {
    snapshot: LedgerSnapshot,
    failed: bool,
}

/// Handle shared between the runner (writer) and the console (reader).
pub type SharedChainView = Arc<RwLock<ChainView>>;

impl ChainView {
    /// A shared view seeded with the recovered snapshot.
    pub fn shared(initial: LedgerSnapshot) -> SharedChainView {
        Arc::new(RwLock::new(ChainView {
            snapshot: initial,
            failed: false,
        }))
    }

    /// Replace the mirrored snapshot (runner, after commit or catch-up).
    pub fn update(&mut self, snapshot: LedgerSnapshot) {
        self.snapshot = snapshot;
    }

    /// Track the FAILED flag for the console prompt.
    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn chain(&self) -> &[Block] {
        &self.snapshot.chain
    }

    pub fn balances(&self) -> &BTreeMap<NodeId, u64> {
        &self.snapshot.balances
    }

    pub fn depth(&self) -> usize {
        self.snapshot.depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_snapshot() {
        let view = ChainView::shared(LedgerSnapshot::default());
        assert_eq!(view.read().depth(), 0);
        assert!(!view.read().is_failed());

        let mut snapshot = LedgerSnapshot::default();
        snapshot.balances.insert(NodeId(1), 70);
        view.write().update(snapshot);
        view.write().set_failed(true);

        assert_eq!(view.read().balances()[&NodeId(1)], 70);
        assert!(view.read().is_failed());
    }
}
