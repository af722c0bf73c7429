//! The replicated ledger state.
//!
//! This crate holds the chained block sequence and the derived balance
//! table. It is the sole authority on whether a block applies:
//!
//! - [`Ledger::apply`] is the **only** mutator. Commits and catch-up both
//!   funnel through it (the latter by replaying a peer chain from depth 0
//!   into a fresh ledger).
//! - [`Ledger::build_candidate`] is the only place proof-of-work nonces are
//!   searched.
//!
//! No I/O happens here; persistence is the runner's job, driven by actions
//! from the node state machine.

mod state;

pub use state::{ApplyError, ApplyOutcome, ChainError, Ledger};
