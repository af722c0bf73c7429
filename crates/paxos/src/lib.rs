//! Per-slot Paxos consensus engine.
//!
//! This crate implements the classic single-decree Paxos roles (proposer,
//! acceptor, learner) as a synchronous sub-state machine, one logical
//! instance per ledger depth. All I/O is performed by the runner via
//! returned [`Action`]s.
//!
//! # State Machine Flow
//!
//! 1. **propose** → bump the sequence counter, broadcast `PREPARE`, arm the
//!    proposal timer
//! 2. **PREPARE received** → promise if the ballot beats our promise, reply
//!    `PROMISE` with the last accepted pair
//! 3. **PROMISE received** → at majority, become leader; adopt the
//!    highest-ballot previously accepted value (standard P2c) or our own
//!    candidate; broadcast `ACCEPT`
//! 4. **ACCEPT received** → accept if the ballot meets our promise, reply
//!    `ACCEPTED` to the leader
//! 5. **ACCEPTED received** → at majority, broadcast `DECIDE`
//! 6. **DECIDE received** → deduplicate, hand the block to the node for
//!    commit; the node advances the slot after a successful apply
//!
//! # Safety
//!
//! - Ballots `(seq, node, depth)` are unique and totally ordered: the depth
//!   prefix pins each instance to one slot, `seq` is strictly monotonic per
//!   proposer, and the node id breaks ties between proposers.
//! - Messages whose ballot depth differs from the current ledger depth are
//!   dropped at the handler edge (stale or future instances).
//! - The leader adopts the highest previously accepted value, so two
//!   different blocks can never be chosen at the same depth.
//!
//! # Liveness
//!
//! A proposer whose round does not resolve within the proposal timeout
//! re-enters `propose` with the same candidate under a higher ballot, unless
//! the ledger depth advanced underneath it, in which case the candidate is
//! abandoned silently (it would commit the same transfer at a second depth).
//!
//! [`Action`]: paxchain_core::Action

mod config;
mod state;

pub use config::PaxosConfig;
pub use state::{PaxosState, SlotView};
