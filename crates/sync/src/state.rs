//! Catch-up collection window.

use paxchain_core::{Action, TimerId};
use paxchain_ledger::Ledger;
use paxchain_types::{LedgerSnapshot, NodeId, PeerMessage, CATCHUP_WINDOW};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Catch-up configuration.
#[derive(Debug, Clone)]
pub struct CatchupConfig {
    /// How long to collect responses before picking a chain.
    pub window: Duration,
}

impl Default for CatchupConfig {
    fn default() -> Self {
        CatchupConfig {
            window: CATCHUP_WINDOW,
        }
    }
}

/// Collects peer ledgers during recovery and picks the replacement.
pub struct CatchupState {
    node: NodeId,
    config: CatchupConfig,
    /// Whether a collection window is open.
    collecting: bool,
    /// Responses in arrival order.
    responses: Vec<(NodeId, LedgerSnapshot)>,
}

impl CatchupState {
    pub fn new(node: NodeId, config: CatchupConfig) -> Self {
        CatchupState {
            node,
            config,
            collecting: false,
            responses: Vec::new(),
        }
    }

    /// Whether a window is currently open.
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Open a collection window: ask every peer for its ledger and arm the
    /// window timer.
    pub fn begin(&mut self) -> Vec<Action> {
        self.collecting = true;
        self.responses.clear();
        info!(node = %self.node, "requesting peer ledgers");
        vec![
            Action::Broadcast {
                message: PeerMessage::RequestLedger { from: self.node },
            },
            Action::SetTimer {
                id: TimerId::Catchup,
                duration: self.config.window,
            },
        ]
    }

    /// Record one peer response. Responses outside a window are stale
    /// (e.g. the node failed again mid-recovery) and are dropped.
    pub fn on_response(&mut self, from: NodeId, snapshot: LedgerSnapshot) {
        if !self.collecting {
            debug!(from = %from, "ledger response outside catch-up window dropped");
            return;
        }
        debug!(from = %from, depth = snapshot.depth(), "collected ledger response");
        self.responses.push((from, snapshot));
    }

    /// Close the window and pick the adoption candidate: the longest chain
    /// strictly deeper than `local_depth` that replays cleanly. Among equal
    /// lengths the earliest response wins.
    pub fn on_window_closed(&mut self, local_depth: u64) -> Option<Ledger> {
        self.collecting = false;
        let responses = std::mem::take(&mut self.responses);

        // Stable sort by descending depth preserves arrival order per length.
        let mut candidates: Vec<&(NodeId, LedgerSnapshot)> = responses.iter().collect();
        candidates.sort_by_key(|(_, s)| std::cmp::Reverse(s.depth()));

        for (from, snapshot) in candidates {
            if snapshot.depth() as u64 <= local_depth {
                break;
            }
            match Ledger::replay(&snapshot.chain) {
                Ok(ledger) => {
                    info!(
                        node = %self.node,
                        from = %from,
                        depth = snapshot.depth(),
                        local_depth,
                        "adopting peer ledger"
                    );
                    return Some(ledger);
                }
                Err(err) => {
                    warn!(from = %from, %err, "peer ledger failed validation, skipping");
                }
            }
        }
        debug!(node = %self.node, local_depth, "no peer ledger beats local state");
        None
    }

    /// Discard the window (node failed mid-recovery).
    pub fn cancel(&mut self) {
        self.collecting = false;
        self.responses.clear();
    }
}
