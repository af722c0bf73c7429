//! The persisted ledger document.

use crate::{all_nodes, Block, NodeId, INITIAL_BALANCE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A whole-ledger snapshot: the chain plus the derived balance table.
///
/// This is both the on-disk document (`{"chain": [...], "balances": {...}}`,
/// atomically replaced after every commit) and the payload of a
/// `LEDGER_RESPONSE` during catch-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Blocks in commit order.
    pub chain: Vec<Block>,
    /// Account balances after applying `chain`.
    pub balances: BTreeMap<NodeId, u64>,
}

impl LedgerSnapshot {
    /// Ledger depth (number of committed blocks).
    pub fn depth(&self) -> usize {
        self.chain.len()
    }
}

impl Default for LedgerSnapshot {
    /// The empty ledger: no blocks, every account at [`INITIAL_BALANCE`].
    fn default() -> Self {
        LedgerSnapshot {
            chain: Vec::new(),
            balances: all_nodes().map(|n| (n, INITIAL_BALANCE)).collect(),
        }
    }
}
