//! Node state machine.

use paxchain_core::{Action, Event, StateMachine, TimerId};
use paxchain_ledger::{ApplyOutcome, Ledger};
use paxchain_paxos::{PaxosConfig, PaxosState, SlotView};
use paxchain_sync::{CatchupConfig, CatchupState};
use paxchain_types::{Block, LedgerSnapshot, NodeId, PeerMessage};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Combined node state machine.
///
/// Composes ledger, Paxos, and catch-up behind one `handle` entry point.
/// While `failed`, the node drops all network traffic and timer fires and
/// rejects every client command except `Recover`; persistence is untouched
/// (a real crash also leaves disk intact).
pub struct NodeStateMachine {
    /// This node's id (also its account id).
    node: NodeId,

    /// Chain plus balances; sole authority on block application.
    ledger: Ledger,

    /// Per-slot consensus engine.
    paxos: PaxosState,

    /// Recovery window for peer ledgers.
    catchup: CatchupState,

    /// Locally induced outage flag.
    failed: bool,

    /// Seeded RNG for proof-of-work nonce search.
    rng: ChaCha8Rng,

    /// Current time (set by the runner before each handle call).
    now: Duration,
}

impl std::fmt::Debug for NodeStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStateMachine")
            .field("node", &self.node)
            .field("depth", &self.ledger.depth())
            .field("failed", &self.failed)
            .field("leader", &self.paxos.is_leader())
            .finish()
    }
}

impl NodeStateMachine {
    /// Create a node from recovered (or empty) ledger state.
    ///
    /// `seed` drives the nonce-search RNG; distinct nodes get distinct
    /// seeds so simulations stay deterministic end to end.
    pub fn new(
        node: NodeId,
        seed: u64,
        paxos_config: PaxosConfig,
        catchup_config: CatchupConfig,
        recovered: LedgerSnapshot,
    ) -> Self {
        NodeStateMachine {
            node,
            ledger: Ledger::from_snapshot(recovered),
            paxos: PaxosState::new(node, paxos_config),
            catchup: CatchupState::new(node, catchup_config),
            failed: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
            now: Duration::ZERO,
        }
    }

    /// This node's id.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Whether the node is in FAILED mode.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// The committed ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The consensus engine (test inspection).
    pub fn paxos(&self) -> &PaxosState {
        &self.paxos
    }

    /// Current ledger depth.
    pub fn depth(&self) -> u64 {
        self.ledger.depth()
    }

    fn view(&self) -> SlotView {
        SlotView {
            depth: self.ledger.depth(),
            tip: self.ledger.tip_hash(),
        }
    }

    fn on_submit_transfer(&mut self, receiver: NodeId, amount: u64) -> Vec<Action> {
        match self
            .ledger
            .build_candidate(self.node, receiver, amount, &mut self.rng)
        {
            Ok(block) => {
                info!(
                    node = %self.node,
                    receiver = %receiver,
                    amount,
                    hash = %block.hash,
                    "starting consensus for transfer"
                );
                let view = self.view();
                self.paxos.propose(view, block)
            }
            Err(reason) => {
                warn!(node = %self.node, %reason, "transfer rejected");
                vec![Action::EmitTransferRejected {
                    receiver,
                    amount,
                    reason,
                }]
            }
        }
    }

    /// Consensus chose `block` for some slot; try to commit it.
    fn on_block_decided(&mut self, block: Block) -> Vec<Action> {
        let pending = self.paxos.my_proposal().cloned();
        match self.ledger.apply(block.clone()) {
            Ok(ApplyOutcome::Applied) => {
                let depth = self.ledger.depth() - 1;
                info!(node = %self.node, depth, hash = %block.hash, "block committed");
                self.paxos.advance_slot();
                let mut actions = vec![
                    Action::PersistLedger {
                        snapshot: self.ledger.snapshot(),
                    },
                    Action::EmitCommitted { block: block.clone(), depth },
                ];
                // A concurrent proposer lost this slot to someone else's
                // transfer: re-enter consensus at the new depth with the
                // same candidate, rebound to the new tip. The proof-of-work
                // digest identifies the transfer across rechaining, so a
                // candidate that just committed is dropped instead of being
                // paid twice.
                if let Some(mine) = pending {
                    if mine.pow_digest() != block.pow_digest() {
                        debug!(node = %self.node, "slot lost, re-proposing candidate at new depth");
                        let view = self.view();
                        let rechained = mine.rechain(view.tip);
                        actions.extend(self.paxos.propose(view, rechained));
                    }
                }
                actions
            }
            // Already in the chain (adopted during catch-up). The current
            // slot may be mid-flight, so acceptor state stays untouched.
            Ok(ApplyOutcome::Duplicate) => vec![],
            Err(err) => {
                debug!(node = %self.node, %err, "decided block does not apply, discarding");
                vec![]
            }
        }
    }

    fn on_fail(&mut self) -> Vec<Action> {
        info!(node = %self.node, "entering FAILED mode");
        self.failed = true;
        self.paxos.abandon_round();
        self.catchup.cancel();
        vec![
            Action::CancelTimer {
                id: TimerId::Proposal,
            },
            Action::CancelTimer {
                id: TimerId::Catchup,
            },
        ]
    }

    fn on_recover(&mut self) -> Vec<Action> {
        info!(node = %self.node, "recovering, starting catch-up");
        self.failed = false;
        self.catchup.begin()
    }

    fn on_catchup_window_closed(&mut self) -> Vec<Action> {
        match self.catchup.on_window_closed(self.ledger.depth()) {
            Some(adopted) => {
                self.ledger.replace(adopted);
                // Any in-flight slot state belongs to a depth we just left.
                self.paxos.advance_slot();
                vec![Action::PersistLedger {
                    snapshot: self.ledger.snapshot(),
                }]
            }
            None => vec![],
        }
    }
}

impl StateMachine for NodeStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        if self.failed {
            match event {
                Event::Recover => return self.on_recover(),
                Event::Fail => return vec![],
                other => {
                    debug!(node = %self.node, event = other.type_name(), "dropped while failed");
                    return vec![];
                }
            }
        }

        let view = self.view();
        match event {
            // Client requests.
            Event::SubmitTransfer { receiver, amount } => self.on_submit_transfer(receiver, amount),
            Event::Fail => self.on_fail(),
            Event::Recover => self.on_recover(),

            // Paxos messages.
            Event::PrepareReceived { from, ballot } => self.paxos.on_prepare(view, from, ballot),
            Event::PromiseReceived {
                from,
                ballot,
                accepted_ballot,
                accepted_value,
            } => self
                .paxos
                .on_promise(view, from, ballot, accepted_ballot, accepted_value),
            Event::AcceptReceived {
                from,
                ballot,
                value,
            } => self.paxos.on_accept(view, from, ballot, value),
            Event::AcceptedReceived {
                from,
                ballot,
                value,
            } => self.paxos.on_accepted(view, from, ballot, value),
            Event::DecideReceived { from, value } => self.paxos.on_decide(from, value),
            Event::BlockDecided { block } => self.on_block_decided(block),

            // Catch-up.
            Event::LedgerRequested { from } => {
                let snapshot = self.ledger.snapshot();
                vec![Action::Send {
                    to: from,
                    message: PeerMessage::LedgerResponse {
                        from: self.node,
                        chain: snapshot.chain,
                        balances: snapshot.balances,
                    },
                }]
            }
            Event::LedgerResponseReceived { from, snapshot } => {
                self.catchup.on_response(from, snapshot);
                vec![]
            }

            // Timers.
            Event::ProposalTimer => self.paxos.on_proposal_timer(view),
            Event::CatchupTimer => self.on_catchup_window_closed(),
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
        self.paxos.set_time(now);
    }

    fn now(&self) -> Duration {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paxchain_types::{Digest, TransferError, INITIAL_BALANCE};

    fn node(id: u64) -> NodeStateMachine {
        NodeStateMachine::new(
            NodeId(id),
            id,
            PaxosConfig::default(),
            CatchupConfig::default(),
            LedgerSnapshot::default(),
        )
    }

    /// Drain one machine's internal loopbacks to quiescence, collecting the
    /// external actions. Mirrors what a runner does with `EnqueueInternal`.
    fn drain(machine: &mut NodeStateMachine, event: Event) -> Vec<Action> {
        let mut queue = vec![event];
        let mut external = Vec::new();
        while let Some(event) = queue.pop() {
            for action in machine.handle(event) {
                match action {
                    Action::EnqueueInternal { event } => queue.push(event),
                    other => external.push(other),
                }
            }
        }
        external
    }

    #[test]
    fn submit_broadcasts_prepare() {
        let mut n1 = node(1);
        let actions = n1.handle(Event::SubmitTransfer {
            receiver: NodeId(2),
            amount: 30,
        });
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Broadcast {
                message: PeerMessage::Prepare { .. }
            }
        )));
        assert!(n1.paxos().my_proposal().is_some());
    }

    #[test]
    fn insufficient_funds_is_reported_not_proposed() {
        let mut n1 = node(1);
        let actions = n1.handle(Event::SubmitTransfer {
            receiver: NodeId(2),
            amount: 150,
        });
        assert!(matches!(
            actions.as_slice(),
            [Action::EmitTransferRejected {
                reason: TransferError::InsufficientFunds { .. },
                ..
            }]
        ));
        assert_eq!(n1.depth(), 0);
        assert!(n1.paxos().my_proposal().is_none());
    }

    #[test]
    fn single_node_cannot_reach_quorum_alone() {
        // One machine self-handles its own PREPARE but only ever collects
        // one promise, so no ACCEPT is broadcast.
        let mut n1 = node(1);
        let actions = drain(
            &mut n1,
            Event::SubmitTransfer {
                receiver: NodeId(2),
                amount: 30,
            },
        );
        assert!(!actions.iter().any(|a| matches!(
            a,
            Action::Broadcast {
                message: PeerMessage::Accept { .. }
            }
        )));
        assert!(!n1.paxos().is_leader());
    }

    #[test]
    fn three_machines_commit_a_transfer() {
        // Route every Send/Broadcast by hand between three live machines;
        // two stay silent (crashed). Majority is still reachable.
        let mut machines: Vec<NodeStateMachine> = (1..=3).map(node).collect();
        let mut wire: Vec<(usize, Event)> = Vec::new(); // (target index, event)
        let mut queue: Vec<(usize, Event)> = vec![(
            0,
            Event::SubmitTransfer {
                receiver: NodeId(2),
                amount: 30,
            },
        )];

        while !queue.is_empty() || !wire.is_empty() {
            queue.extend(wire.drain(..));
            let (target, event) = queue.remove(0);
            for action in machines[target].handle(event) {
                match action {
                    Action::EnqueueInternal { event } => queue.insert(0, (target, event)),
                    Action::Send { to, message } => {
                        if (1..=3).contains(&to.0) {
                            wire.push(((to.0 - 1) as usize, Event::from(message)));
                        }
                    }
                    Action::Broadcast { message } => {
                        for peer in 0..3 {
                            if peer != target {
                                wire.push((peer, Event::from(message.clone())));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        for machine in &machines {
            assert_eq!(machine.depth(), 1, "node {}", machine.node_id());
            assert_eq!(machine.ledger().balance(NodeId(1)), 70);
            assert_eq!(machine.ledger().balance(NodeId(2)), 130);
        }
    }

    #[test]
    fn failed_node_drops_network_and_rejects_submits() {
        let mut n3 = node(3);
        let actions = n3.handle(Event::Fail);
        assert!(n3.is_failed());
        assert_eq!(actions.len(), 2); // both timers cancelled

        assert!(n3
            .handle(Event::LedgerRequested { from: NodeId(1) })
            .is_empty());
        assert!(n3
            .handle(Event::SubmitTransfer {
                receiver: NodeId(1),
                amount: 10,
            })
            .is_empty());
        assert_eq!(n3.depth(), 0);
    }

    #[test]
    fn fail_drops_proposer_candidate() {
        let mut n1 = node(1);
        n1.handle(Event::SubmitTransfer {
            receiver: NodeId(2),
            amount: 30,
        });
        assert!(n1.paxos().my_proposal().is_some());
        n1.handle(Event::Fail);
        assert!(n1.paxos().my_proposal().is_none());
    }

    #[test]
    fn recover_starts_catchup() {
        let mut n3 = node(3);
        n3.handle(Event::Fail);
        let actions = n3.handle(Event::Recover);
        assert!(!n3.is_failed());
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Broadcast {
                message: PeerMessage::RequestLedger { .. }
            }
        )));
    }

    #[test]
    fn catchup_adopts_longer_peer_ledger() {
        // Build a depth-2 chain on node 1.
        let mut n1 = node(1);
        for (to, amount) in [(2u64, 30), (4, 20)] {
            let block = n1
                .ledger()
                .build_candidate(NodeId(1), NodeId(to), amount, &mut ChaCha8Rng::seed_from_u64(9))
                .unwrap();
            n1.handle(Event::BlockDecided { block });
        }
        assert_eq!(n1.depth(), 2);
        let snapshot = n1.ledger().snapshot();

        // Node 3 recovers and learns it.
        let mut n3 = node(3);
        n3.handle(Event::Fail);
        n3.handle(Event::Recover);
        n3.handle(Event::LedgerResponseReceived {
            from: NodeId(1),
            snapshot: snapshot.clone(),
        });
        let actions = n3.handle(Event::CatchupTimer);

        assert_eq!(n3.depth(), 2);
        assert_eq!(n3.ledger().snapshot(), snapshot);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::PersistLedger { .. })));
    }

    #[test]
    fn ledger_request_answered_with_snapshot() {
        let mut n2 = node(2);
        let actions = n2.handle(Event::LedgerRequested { from: NodeId(4) });
        match actions.as_slice() {
            [Action::Send {
                to,
                message: PeerMessage::LedgerResponse { from, balances, .. },
            }] => {
                assert_eq!(*to, NodeId(4));
                assert_eq!(*from, NodeId(2));
                assert_eq!(balances[&NodeId(2)], INITIAL_BALANCE);
            }
            other => panic!("expected one LedgerResponse send, got {other:?}"),
        }
    }

    #[test]
    fn commit_persists_and_emits() {
        let mut n1 = node(1);
        let block = n1
            .ledger()
            .build_candidate(NodeId(1), NodeId(5), 40, &mut ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        let actions = n1.handle(Event::BlockDecided {
            block: block.clone(),
        });
        assert_eq!(n1.depth(), 1);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::PersistLedger { .. })));
        assert!(actions.iter().any(
            |a| matches!(a, Action::EmitCommitted { depth: 0, block: b } if b.hash == block.hash)
        ));
    }

    #[test]
    fn stale_decide_leaves_state_untouched() {
        let mut n1 = node(1);
        let stale = Block::seal(
            NodeId(1),
            NodeId(2),
            10,
            "AAAAAAAA".into(),
            Digest::of("not our tip"),
        );
        let actions = n1.handle(Event::BlockDecided { block: stale });
        assert!(actions.is_empty());
        assert_eq!(n1.depth(), 0);
    }
}
