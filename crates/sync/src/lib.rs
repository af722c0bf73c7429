//! Catch-up: rejoining the quorum after an outage.
//!
//! A recovering node broadcasts `REQUEST_LEDGER`, collects `LEDGER_RESPONSE`
//! messages for a fixed window, and adopts the longest peer chain that
//! replays cleanly from depth 0, provided it is longer than what the node
//! already has. Ties in length break in favor of the first response
//! collected, which keeps the choice deterministic for tests (all valid
//! equal-length chains are identical anyway, by Paxos agreement plus the
//! hash chain).

mod state;

pub use state::{CatchupConfig, CatchupState};
