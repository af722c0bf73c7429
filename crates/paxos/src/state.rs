//! Paxos slot state machine.

use crate::PaxosConfig;
use paxchain_core::{Action, Event, TimerId};
use paxchain_types::{Ballot, Block, Digest, NodeId, PeerMessage, MAJORITY};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Read-only snapshot of the ledger position, taken by the node before each
/// handler call so the engine never aliases ledger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView {
    /// Current ledger depth: the slot being decided.
    pub depth: u64,
    /// Digest of the last committed block (zero sentinel when empty).
    pub tip: Digest,
}

/// Paxos state for the slot at the current ledger depth.
///
/// Proposer, acceptor, and learner are co-located; each node runs all three
/// roles. Round state is reset by [`PaxosState::advance_slot`] when a block
/// commits; `next_seq` and the decided-hash set survive across slots.
pub struct PaxosState {
    /// This node's id.
    node: NodeId,

    config: PaxosConfig,

    /// Monotonic sequence counter used when proposing. Not persisted; the
    /// depth prefix of the ballot keeps restarted proposers safe.
    next_seq: u64,

    // ─── Acceptor ───
    /// Highest ballot this node has promised.
    promised: Option<Ballot>,
    /// Last (ballot, value) this node accepted in this slot.
    accepted: Option<(Ballot, Block)>,

    // ─── Proposer ───
    /// Ballot of the round this node is currently driving.
    current_ballot: Option<Ballot>,
    /// The block this node wants chosen.
    my_proposal: Option<Block>,
    /// Promises collected for `current_ballot`, keyed by acceptor.
    promises: HashMap<NodeId, (Option<Ballot>, Option<Block>)>,
    /// Acceptors that answered `ACCEPTED` for `current_ballot`.
    accepts: HashSet<NodeId>,
    /// Set once a majority has promised `current_ballot`.
    is_leader: bool,

    // ─── Learner ───
    /// Hashes of blocks already sent to commit, across all slots.
    decided: HashSet<Digest>,

    now: Duration,
}

impl PaxosState {
    pub fn new(node: NodeId, config: PaxosConfig) -> Self {
        PaxosState {
            node,
            config,
            next_seq: 0,
            promised: None,
            accepted: None,
            current_ballot: None,
            my_proposal: None,
            promises: HashMap::new(),
            accepts: HashSet::new(),
            is_leader: false,
            decided: HashSet::new(),
            now: Duration::ZERO,
        }
    }

    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    /// Whether this node currently leads a round.
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// The candidate this node is trying to get chosen, if any.
    pub fn my_proposal(&self) -> Option<&Block> {
        self.my_proposal.as_ref()
    }

    /// Current sequence counter (test inspection).
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Highest promised ballot (test inspection).
    pub fn promised(&self) -> Option<Ballot> {
        self.promised
    }

    /// Route a reply: messages to self are looped back as internal events
    /// instead of crossing the network. This is how a proposer handles its
    /// own PREPARE/ACCEPT/DECIDE as an acceptor and learner.
    fn reply(&self, to: NodeId, message: PeerMessage) -> Action {
        if to == self.node {
            Action::EnqueueInternal {
                event: Event::from(message),
            }
        } else {
            Action::Send { to, message }
        }
    }

    /// Begin a proposer round for the slot in `view` with `block` as the
    /// candidate.
    pub fn propose(&mut self, view: SlotView, block: Block) -> Vec<Action> {
        self.next_seq += 1;
        let ballot = Ballot::new(self.next_seq, self.node, view.depth);
        self.current_ballot = Some(ballot);
        self.my_proposal = Some(block);
        self.promises.clear();
        self.accepts.clear();
        self.is_leader = false;

        info!(node = %self.node, ballot = ?ballot, at = ?self.now, "sending PREPARE");

        let prepare = PeerMessage::Prepare {
            from: self.node,
            ballot,
        };
        vec![
            Action::Broadcast {
                message: prepare.clone(),
            },
            // Self-handle as an acceptor.
            Action::EnqueueInternal {
                event: Event::from(prepare),
            },
            Action::SetTimer {
                id: TimerId::Proposal,
                duration: self.config.proposal_timeout,
            },
        ]
    }

    /// Acceptor: handle `PREPARE`.
    pub fn on_prepare(&mut self, view: SlotView, from: NodeId, ballot: Ballot) -> Vec<Action> {
        if ballot.depth != view.depth {
            trace!(ballot = ?ballot, depth = view.depth, "stale-depth PREPARE dropped");
            return vec![];
        }
        if self.promised.is_some_and(|p| ballot <= p) {
            trace!(ballot = ?ballot, promised = ?self.promised, "PREPARE below promise dropped");
            return vec![];
        }
        self.promised = Some(ballot);
        debug!(node = %self.node, to = %from, ballot = ?ballot, "PROMISE");

        let (accepted_ballot, accepted_value) = match &self.accepted {
            Some((b, v)) => (Some(*b), Some(v.clone())),
            None => (None, None),
        };
        vec![self.reply(
            from,
            PeerMessage::Promise {
                from: self.node,
                ballot,
                accepted_ballot,
                accepted_value,
            },
        )]
    }

    /// Proposer: handle `PROMISE`.
    pub fn on_promise(
        &mut self,
        view: SlotView,
        from: NodeId,
        ballot: Ballot,
        accepted_ballot: Option<Ballot>,
        accepted_value: Option<Block>,
    ) -> Vec<Action> {
        if ballot.depth != view.depth {
            trace!(ballot = ?ballot, depth = view.depth, "stale-depth PROMISE dropped");
            return vec![];
        }
        if self.current_ballot != Some(ballot) {
            trace!(ballot = ?ballot, current = ?self.current_ballot, "PROMISE for foreign ballot dropped");
            return vec![];
        }

        self.promises.insert(from, (accepted_ballot, accepted_value));
        if self.promises.len() < MAJORITY || self.is_leader {
            return vec![];
        }

        self.is_leader = true;
        info!(node = %self.node, ballot = ?ballot, "majority promises, becoming leader");

        // P2c: adopt the value accepted under the highest ballot, if any
        // acceptor reported one.
        let adopted = self
            .promises
            .values()
            .filter_map(|(b, v)| Some(((*b)?, v.clone()?)))
            .max_by_key(|(b, _)| *b)
            .map(|(_, v)| v);
        let chosen = match adopted {
            Some(value) => {
                debug!(node = %self.node, "adopting previously accepted value");
                value
            }
            None => match self.my_proposal.clone() {
                Some(value) => value,
                None => {
                    // Round was abandoned between PREPARE and this promise.
                    self.is_leader = false;
                    return vec![];
                }
            },
        };

        // The slot straddled a depth change: the value to drive no longer
        // links our tip, so it can never apply. Abandon this round and
        // re-propose our own transfer rebound to the current tip.
        if chosen.prev_hash != view.tip {
            debug!(node = %self.node, "adopted value links a stale tip, re-proposing");
            let mine = match self.my_proposal.take() {
                Some(block) => block.rechain(view.tip),
                None => return vec![],
            };
            return self.propose(view, mine);
        }

        self.accepts.clear();
        let accept = PeerMessage::Accept {
            from: self.node,
            ballot,
            value: chosen,
        };
        vec![
            Action::Broadcast {
                message: accept.clone(),
            },
            Action::EnqueueInternal {
                event: Event::from(accept),
            },
        ]
    }

    /// Acceptor: handle `ACCEPT`.
    pub fn on_accept(
        &mut self,
        view: SlotView,
        from: NodeId,
        ballot: Ballot,
        value: Block,
    ) -> Vec<Action> {
        if ballot.depth != view.depth {
            trace!(ballot = ?ballot, depth = view.depth, "stale-depth ACCEPT dropped");
            return vec![];
        }
        if self.promised.is_some_and(|p| ballot < p) {
            trace!(ballot = ?ballot, promised = ?self.promised, "ACCEPT below promise dropped");
            return vec![];
        }
        self.promised = Some(ballot);
        self.accepted = Some((ballot, value.clone()));
        debug!(node = %self.node, ballot = ?ballot, from = %from, "ACCEPTED");

        vec![self.reply(
            from,
            PeerMessage::Accepted {
                from: self.node,
                ballot,
                value,
            },
        )]
    }

    /// Proposer: handle `ACCEPTED`.
    pub fn on_accepted(
        &mut self,
        view: SlotView,
        from: NodeId,
        ballot: Ballot,
        value: Block,
    ) -> Vec<Action> {
        if ballot.depth != view.depth {
            trace!(ballot = ?ballot, depth = view.depth, "stale-depth ACCEPTED dropped");
            return vec![];
        }
        if !self.is_leader || self.current_ballot != Some(ballot) {
            trace!(ballot = ?ballot, "ACCEPTED for foreign ballot dropped");
            return vec![];
        }

        self.accepts.insert(from);
        if self.accepts.len() < MAJORITY {
            return vec![];
        }

        // Consensus reached. The decided-set check stops a late ACCEPTED
        // from re-broadcasting the decision; the set itself is only updated
        // by the learner below.
        if self.decided.contains(&value.hash) {
            return vec![Action::CancelTimer {
                id: TimerId::Proposal,
            }];
        }
        info!(node = %self.node, ballot = ?ballot, hash = %value.hash, "consensus reached");
        self.accepts.clear();

        let decide = PeerMessage::Decide {
            from: self.node,
            value,
        };
        vec![
            Action::CancelTimer {
                id: TimerId::Proposal,
            },
            Action::Broadcast {
                message: decide.clone(),
            },
            Action::EnqueueInternal {
                event: Event::from(decide),
            },
        ]
    }

    /// Learner: handle `DECIDE`.
    ///
    /// `DECIDE` carries no ballot; staleness is handled by the decided-hash
    /// set here and by the ledger's prev-hash validation at commit.
    pub fn on_decide(&mut self, from: NodeId, value: Block) -> Vec<Action> {
        if self.decided.contains(&value.hash) {
            trace!(hash = %value.hash, "duplicate DECIDE dropped");
            return vec![];
        }
        self.decided.insert(value.hash);
        info!(node = %self.node, from = %from, hash = %value.hash, "DECIDE, committing");

        vec![
            Action::CancelTimer {
                id: TimerId::Proposal,
            },
            Action::EnqueueInternal {
                event: Event::BlockDecided { block: value },
            },
        ]
    }

    /// Proposal timer expired without a decision for our candidate.
    pub fn on_proposal_timer(&mut self, view: SlotView) -> Vec<Action> {
        let Some(block) = self.my_proposal.clone() else {
            return vec![];
        };
        // The ledger moved past the slot we were proposing in: committing
        // this transfer again at a new depth would double-spend it, so the
        // candidate is abandoned.
        if self.current_ballot.map(|b| b.depth) != Some(view.depth) {
            debug!(node = %self.node, "slot advanced during proposal, abandoning candidate");
            self.abandon_round();
            return vec![];
        }
        info!(node = %self.node, "proposal timeout, retrying with higher ballot");
        self.propose(view, block)
    }

    /// Drop the proposer round (node failure, or abandoned candidate).
    /// Acceptor state and the decided set are untouched.
    pub fn abandon_round(&mut self) {
        self.current_ballot = None;
        self.my_proposal = None;
        self.promises.clear();
        self.accepts.clear();
        self.is_leader = false;
    }

    /// Reset per-slot state after a commit, in preparation for the next
    /// depth. `next_seq` and the decided set are preserved.
    pub fn advance_slot(&mut self) {
        self.promised = None;
        self.accepted = None;
        self.abandon_round();
    }
}
