//! Action types for the deterministic state machine.

use crate::{Event, TimerId};
use paxchain_types::{Block, LedgerSnapshot, NodeId, PeerMessage, TransferError};
use std::time::Duration;

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions and may convert results back into events.
#[derive(Debug, Clone)]
pub enum Action {
    // ─── Network ───
    /// Deliver `message` to one peer, best effort, after the wire delay.
    Send { to: NodeId, message: PeerMessage },

    /// Deliver `message` to every peer except self.
    Broadcast { message: PeerMessage },

    // ─── Timers ───
    /// Arm (or re-arm) a timer.
    SetTimer { id: TimerId, duration: Duration },

    /// Cancel a timer if armed.
    CancelTimer { id: TimerId },

    // ─── Internal ───
    /// Loop an event back into the state machine at the current instant,
    /// ahead of external inputs. Used for Paxos self-delivery: a proposer
    /// is also an acceptor, and its own PREPARE/ACCEPT/DECIDE must be
    /// handled without a network round trip.
    EnqueueInternal { event: Event },

    // ─── Storage ───
    /// Write the whole snapshot durably. The write must be atomic against
    /// a crash; a failed write is fatal to the process.
    PersistLedger { snapshot: LedgerSnapshot },

    // ─── External notifications ───
    /// A block was committed at `depth`, for observers (console, tests).
    EmitCommitted { block: Block, depth: u64 },

    /// A submitted transfer was refused locally, for the console.
    EmitTransferRejected {
        receiver: NodeId,
        amount: u64,
        reason: TransferError,
    },
}

impl Action {
    /// Action type name, for logging and stats.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Send { .. } => "Send",
            Action::Broadcast { .. } => "Broadcast",
            Action::SetTimer { .. } => "SetTimer",
            Action::CancelTimer { .. } => "CancelTimer",
            Action::EnqueueInternal { .. } => "EnqueueInternal",
            Action::PersistLedger { .. } => "PersistLedger",
            Action::EmitCommitted { .. } => "EmitCommitted",
            Action::EmitTransferRejected { .. } => "EmitTransferRejected",
        }
    }
}
