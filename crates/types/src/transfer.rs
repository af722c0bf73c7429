//! User-facing transfer rejection reasons.

use crate::NodeId;
use thiserror::Error;

/// Why a submitted transfer was refused before reaching consensus.
///
/// These are user errors: they are reported locally at submission time and
/// never touch the ledger or the Paxos engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The sender's balance does not cover the amount.
    #[error("insufficient funds: balance {balance} < amount {amount}")]
    InsufficientFunds { balance: u64, amount: u64 },

    /// Sender and receiver are the same account.
    #[error("cannot transfer to self")]
    SelfTransfer,

    /// The amount must be strictly positive.
    #[error("amount must be positive")]
    NonPositiveAmount,

    /// The receiver is not one of the five cluster accounts.
    #[error("unknown account {0}")]
    UnknownAccount(NodeId),
}
