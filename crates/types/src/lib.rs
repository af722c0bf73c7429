//! Core types for the paxchain replicated ledger.
//!
//! This crate provides the foundational types used throughout the
//! implementation:
//!
//! - **Primitives**: SHA-256 digests with hex wire form
//! - **Identifiers**: `NodeId` (node ids double as account ids)
//! - **Ledger types**: `Block` with its proof-of-work tag, `LedgerSnapshot`
//! - **Consensus types**: `Ballot` with its depth-major total order
//! - **Wire messages**: the `PeerMessage` JSON protocol
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. Everything
//! here is passive data; behavior lives in the ledger, paxos, and node crates.

mod ballot;
mod block;
mod constants;
mod hash;
mod identifiers;
mod network;
mod snapshot;
mod transfer;

pub use ballot::Ballot;
pub use block::{random_nonce, Block};
pub use constants::{
    all_nodes, peers_of, CATCHUP_WINDOW, INITIAL_BALANCE, MAJORITY, NET_DELAY, NONCE_LEN,
    NUM_NODES, PROPOSAL_TIMEOUT,
};
pub use hash::{Digest, HexError};
pub use identifiers::NodeId;
pub use network::PeerMessage;
pub use snapshot::LedgerSnapshot;
pub use transfer::TransferError;
