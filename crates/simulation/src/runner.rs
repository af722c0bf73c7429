//! Deterministic simulation runner.
//!
//! Processes events in deterministic order and executes actions. Given the
//! same seed and schedule, a run produces identical results every time.
//! Each node has its own independent snapshot storage; the runner is also
//! where `Fail`/`Recover` flip the simulated network, so an outage and its
//! transport effects happen in the same deterministic step.

use crate::event_queue::EventKey;
use crate::network::{NetworkConfig, SimulatedNetwork};
use crate::storage::SimStorage;
use paxchain_core::{Action, Event, StateMachine, TimerId};
use paxchain_node::NodeStateMachine;
use paxchain_paxos::PaxosConfig;
use paxchain_sync::CatchupConfig;
use paxchain_types::{peers_of, Block, LedgerSnapshot, NodeId, TransferError, NUM_NODES};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, trace};

/// A queued event, remembering the sending node for network deliveries so
/// that in-flight traffic from a node that failed after sending is dropped
/// at delivery time.
#[derive(Debug)]
struct Queued {
    event: Event,
    origin: Option<NodeId>,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Total actions generated.
    pub actions_generated: u64,
    /// Messages scheduled for delivery.
    pub messages_sent: u64,
    /// Messages dropped because an endpoint was failed.
    pub messages_dropped: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled.
    pub timers_cancelled: u64,
    /// Blocks committed (across all nodes).
    pub commits: u64,
}

/// Deterministic five-node simulation.
pub struct SimulationRunner {
    /// The five node state machines, index `i` holding node `i + 1`.
    nodes: Vec<NodeStateMachine>,

    /// Global event queue, ordered deterministically.
    queue: BTreeMap<EventKey, Queued>,

    /// Insertion counter for key uniqueness.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    /// Simulated network.
    network: SimulatedNetwork,

    /// Timer registry for cancellation: (node, timer) → queued key.
    timers: HashMap<(NodeId, TimerId), EventKey>,

    /// Per-node snapshot storage.
    storage: Vec<SimStorage>,

    /// Master seed (restarted nodes derive fresh RNG streams from it).
    seed: u64,

    stats: SimulationStats,

    /// Committed blocks observed via `EmitCommitted`: (node, depth, block).
    commits: Vec<(NodeId, u64, Block)>,

    /// Rejected transfers observed via `EmitTransferRejected`.
    rejections: Vec<(NodeId, TransferError)>,
}

fn node_seed(master: u64, id: u64) -> u64 {
    master.wrapping_add(id).wrapping_mul(0x517cc1b727220a95)
}

impl SimulationRunner {
    /// Create a fresh five-node cluster.
    pub fn new(seed: u64) -> Self {
        Self::with_network(seed, NetworkConfig::default())
    }

    /// Create a cluster with a custom network configuration.
    pub fn with_network(seed: u64, network_config: NetworkConfig) -> Self {
        let nodes = (1..=NUM_NODES)
            .map(|id| {
                NodeStateMachine::new(
                    NodeId(id),
                    node_seed(seed, id),
                    PaxosConfig::default(),
                    CatchupConfig::default(),
                    LedgerSnapshot::default(),
                )
            })
            .collect();
        SimulationRunner {
            nodes,
            queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network: SimulatedNetwork::new(network_config),
            timers: HashMap::new(),
            storage: (0..NUM_NODES).map(|_| SimStorage::new()).collect(),
            seed,
            stats: SimulationStats::default(),
            commits: Vec::new(),
            rejections: Vec::new(),
        }
    }

    fn index(node: NodeId) -> usize {
        (node.0 - 1) as usize
    }

    /// A node's state machine.
    pub fn node(&self, node: NodeId) -> &NodeStateMachine {
        &self.nodes[Self::index(node)]
    }

    /// A node's snapshot storage.
    pub fn storage(&self, node: NodeId) -> &SimStorage {
        &self.storage[Self::index(node)]
    }

    /// Current simulation time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Simulation statistics.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Commits observed so far, as (node, depth, block).
    pub fn commits(&self) -> &[(NodeId, u64, Block)] {
        &self.commits
    }

    /// Transfer rejections observed so far.
    pub fn rejections(&self) -> &[(NodeId, TransferError)] {
        &self.rejections
    }

    /// Schedule a client transfer submission.
    pub fn submit_at(&mut self, node: NodeId, receiver: NodeId, amount: u64, at: Duration) {
        self.schedule(node, at, None, Event::SubmitTransfer { receiver, amount });
    }

    /// Schedule a `failProcess` on `node`.
    pub fn fail_at(&mut self, node: NodeId, at: Duration) {
        self.schedule(node, at, None, Event::Fail);
    }

    /// Schedule a `fixProcess` on `node`.
    pub fn recover_at(&mut self, node: NodeId, at: Duration) {
        self.schedule(node, at, None, Event::Recover);
    }

    /// Kill a node's process and bring up a fresh one from its snapshot
    /// store, as a crashed-and-restarted node would. Queued timers die with
    /// the process; recovery (and catch-up) starts immediately.
    pub fn restart_node(&mut self, node: NodeId) {
        let stale: Vec<(NodeId, TimerId)> = self
            .timers
            .keys()
            .filter(|(n, _)| *n == node)
            .copied()
            .collect();
        for key in stale {
            if let Some(event_key) = self.timers.remove(&key) {
                self.queue.remove(&event_key);
            }
        }

        let snapshot = self.storage(node).load();
        debug!(node = %node, depth = snapshot.depth(), "restarting node from snapshot");
        self.nodes[Self::index(node)] = NodeStateMachine::new(
            node,
            // A restarted process gets a fresh RNG stream.
            node_seed(self.seed ^ 0xd6e8_feb8_6659_fd93, node.0),
            PaxosConfig::default(),
            CatchupConfig::default(),
            snapshot,
        );
        self.network.heal(node);
        self.schedule(node, self.now, None, Event::Recover);
    }

    /// Run until the queue drains or `end` is reached.
    pub fn run_until(&mut self, end: Duration) {
        while let Some((&key, _)) = self.queue.first_key_value() {
            if key.time > end {
                break;
            }
            let (key, queued) = self.queue.pop_first().expect("peeked");
            self.now = key.time;
            let node = key.node;

            // In-flight drops: a network event dies if either endpoint is
            // down at delivery time.
            if let Some(origin) = queued.origin {
                if self.network.is_down(origin) || self.network.is_down(node) {
                    self.stats.messages_dropped += 1;
                    trace!(from = %origin, to = %node, "in-flight message dropped");
                    continue;
                }
            }

            // A fired timer no longer needs its registry entry.
            if let Some(id) = timer_id(&queued.event) {
                if self.timers.get(&(node, id)) == Some(&key) {
                    self.timers.remove(&(node, id));
                }
            }

            // The outage flag and the transport belong to the same step:
            // flip the network before the machine sees the event.
            match &queued.event {
                Event::Fail => self.network.fail(node),
                Event::Recover => self.network.heal(node),
                _ => {}
            }

            self.stats.events_processed += 1;
            let machine = &mut self.nodes[Self::index(node)];
            machine.set_time(self.now);
            let actions = machine.handle(queued.event);
            self.stats.actions_generated += actions.len() as u64;

            for action in actions {
                self.process_action(node, action);
            }
        }
        if end > self.now {
            self.now = end;
        }
    }

    /// Run for `duration` of simulated time.
    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(self.now + duration);
    }

    fn schedule(&mut self, node: NodeId, at: Duration, origin: Option<NodeId>, event: Event) {
        self.sequence += 1;
        let key = EventKey::new(at, &event, node, self.sequence);
        self.queue.insert(key, Queued { event, origin });
    }

    fn deliver(&mut self, from: NodeId, to: NodeId, event: Event) {
        match self.network.should_deliver(from, to) {
            Some(latency) => {
                let at = self.now + latency;
                self.schedule(to, at, Some(from), event);
                self.stats.messages_sent += 1;
            }
            None => {
                self.stats.messages_dropped += 1;
                trace!(from = %from, to = %to, "message dropped at send");
            }
        }
    }

    fn process_action(&mut self, from: NodeId, action: Action) {
        match action {
            Action::Send { to, message } => {
                self.deliver(from, to, Event::from(message));
            }
            Action::Broadcast { message } => {
                let peers: Vec<NodeId> = peers_of(from).collect();
                for to in peers {
                    self.deliver(from, to, Event::from(message.clone()));
                }
            }
            Action::SetTimer { id, duration } => {
                // Re-arming replaces any pending instance.
                if let Some(old) = self.timers.remove(&(from, id)) {
                    self.queue.remove(&old);
                }
                let event = timer_event(id);
                let at = self.now + duration;
                self.sequence += 1;
                let key = EventKey::new(at, &event, from, self.sequence);
                self.queue.insert(
                    key,
                    Queued {
                        event,
                        origin: None,
                    },
                );
                self.timers.insert((from, id), key);
                self.stats.timers_set += 1;
            }
            Action::CancelTimer { id } => {
                if let Some(key) = self.timers.remove(&(from, id)) {
                    self.queue.remove(&key);
                    self.stats.timers_cancelled += 1;
                }
            }
            Action::EnqueueInternal { event } => {
                self.schedule(from, self.now, None, event);
            }
            Action::PersistLedger { snapshot } => {
                self.storage[Self::index(from)].save(snapshot);
            }
            Action::EmitCommitted { block, depth } => {
                self.stats.commits += 1;
                self.commits.push((from, depth, block));
            }
            Action::EmitTransferRejected { reason, .. } => {
                debug!(node = %from, %reason, "transfer rejected");
                self.rejections.push((from, reason));
            }
        }
    }
}

fn timer_event(id: TimerId) -> Event {
    match id {
        TimerId::Proposal => Event::ProposalTimer,
        TimerId::Catchup => Event::CatchupTimer,
    }
}

fn timer_id(event: &Event) -> Option<TimerId> {
    match event {
        Event::ProposalTimer => Some(TimerId::Proposal),
        Event::CatchupTimer => Some(TimerId::Catchup),
        _ => None,
    }
}
