//! Event types for the deterministic state machine.

use paxchain_types::{Ballot, Block, LedgerSnapshot, NodeId, PeerMessage};

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
///
/// This ensures causality is preserved: internal events (consequences of
/// processing an event) are handled before new external inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Internal events: consequences of prior event processing.
    Internal = 0,
    /// Timer events: scheduled by the node itself.
    Timer = 1,
    /// Network events: inputs from other nodes.
    Network = 2,
    /// Client events: inputs from the console.
    Client = 3,
}

/// All possible events a node can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone)]
pub enum Event {
    // ─── Timers ───
    /// The proposer round timed out without a decision.
    ProposalTimer,
    /// The catch-up collection window closed.
    CatchupTimer,

    // ─── Network messages ───
    /// A proposer solicits promises.
    PrepareReceived { from: NodeId, ballot: Ballot },
    /// An acceptor promised a ballot, reporting its last accepted pair.
    PromiseReceived {
        from: NodeId,
        ballot: Ballot,
        accepted_ballot: Option<Ballot>,
        accepted_value: Option<Block>,
    },
    /// The leader asks acceptors to accept a value.
    AcceptReceived {
        from: NodeId,
        ballot: Ballot,
        value: Block,
    },
    /// An acceptor accepted a value.
    AcceptedReceived {
        from: NodeId,
        ballot: Ballot,
        value: Block,
    },
    /// A value was chosen for its slot.
    DecideReceived { from: NodeId, value: Block },
    /// A recovering peer asked for our committed state.
    LedgerRequested { from: NodeId },
    /// A peer answered our catch-up request.
    LedgerResponseReceived {
        from: NodeId,
        snapshot: LedgerSnapshot,
    },

    // ─── Client requests ───
    /// Transfer `amount` from this node's account to `receiver`.
    SubmitTransfer { receiver: NodeId, amount: u64 },
    /// Enter FAILED mode: drop traffic, cancel timers.
    Fail,
    /// Leave FAILED mode and start catch-up.
    Recover,

    // ─── Internal ───
    /// Consensus chose `block` for the current slot; commit it.
    BlockDecided { block: Block },
}

impl Event {
    /// Ordering priority of this event.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::BlockDecided { .. } => EventPriority::Internal,
            Event::ProposalTimer | Event::CatchupTimer => EventPriority::Timer,
            Event::PrepareReceived { .. }
            | Event::PromiseReceived { .. }
            | Event::AcceptReceived { .. }
            | Event::AcceptedReceived { .. }
            | Event::DecideReceived { .. }
            | Event::LedgerRequested { .. }
            | Event::LedgerResponseReceived { .. } => EventPriority::Network,
            Event::SubmitTransfer { .. } | Event::Fail | Event::Recover => EventPriority::Client,
        }
    }

    /// Event type name, for logging and stats.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::ProposalTimer => "ProposalTimer",
            Event::CatchupTimer => "CatchupTimer",
            Event::PrepareReceived { .. } => "PrepareReceived",
            Event::PromiseReceived { .. } => "PromiseReceived",
            Event::AcceptReceived { .. } => "AcceptReceived",
            Event::AcceptedReceived { .. } => "AcceptedReceived",
            Event::DecideReceived { .. } => "DecideReceived",
            Event::LedgerRequested { .. } => "LedgerRequested",
            Event::LedgerResponseReceived { .. } => "LedgerResponseReceived",
            Event::SubmitTransfer { .. } => "SubmitTransfer",
            Event::Fail => "Fail",
            Event::Recover => "Recover",
            Event::BlockDecided { .. } => "BlockDecided",
        }
    }
}

impl From<PeerMessage> for Event {
    /// Convert an inbound wire message into its delivery event.
    fn from(message: PeerMessage) -> Self {
        match message {
            PeerMessage::Prepare { from, ballot } => Event::PrepareReceived { from, ballot },
            PeerMessage::Promise {
                from,
                ballot,
                accepted_ballot,
                accepted_value,
            } => Event::PromiseReceived {
                from,
                ballot,
                accepted_ballot,
                accepted_value,
            },
            PeerMessage::Accept {
                from,
                ballot,
                value,
            } => Event::AcceptReceived {
                from,
                ballot,
                value,
            },
            PeerMessage::Accepted {
                from,
                ballot,
                value,
            } => Event::AcceptedReceived {
                from,
                ballot,
                value,
            },
            PeerMessage::Decide { from, value } => Event::DecideReceived { from, value },
            PeerMessage::RequestLedger { from } => Event::LedgerRequested { from },
            PeerMessage::LedgerResponse {
                from,
                chain,
                balances,
            } => Event::LedgerResponseReceived {
                from,
                snapshot: LedgerSnapshot { chain, balances },
            },
        }
    }
}
