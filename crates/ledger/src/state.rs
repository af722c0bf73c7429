//! Ledger state.

use paxchain_types::{random_nonce, Block, Digest, LedgerSnapshot, NodeId, TransferError};
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Why a block was rejected by [`Ledger::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The block does not extend the current tip.
    #[error("prev_hash mismatch: block links {got}, tip is {expected}")]
    PrevHashMismatch { expected: Digest, got: Digest },

    /// The proof-of-work tag does not hold for the block's nonce.
    #[error("proof-of-work tag invalid")]
    PowTagInvalid,

    /// The stored hash does not match the recomputed digest.
    #[error("block hash does not match its contents")]
    HashMismatch,

    /// The sender cannot cover the amount at this point in the chain.
    #[error("sender {sender} has insufficient funds ({balance} < {amount})")]
    InsufficientFunds {
        sender: NodeId,
        balance: u64,
        amount: u64,
    },

    /// Sender and receiver are the same account.
    #[error("sender and receiver are the same account")]
    SelfTransfer,

    /// The amount must be strictly positive.
    #[error("amount must be positive")]
    NonPositiveAmount,
}

/// A rejected block inside a replayed chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain invalid at depth {depth}: {source}")]
pub struct ChainError {
    /// Index of the offending block.
    pub depth: usize,
    /// Why it failed to apply.
    #[source]
    pub source: ApplyError,
}

/// Result of a successful [`Ledger::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The block was appended and balances were updated.
    Applied,
    /// The block is already in the chain; state is unchanged.
    Duplicate,
}

/// The chained block sequence plus the derived balance table.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    balances: BTreeMap<NodeId, u64>,
    /// Hashes of every block in `chain`, for the duplicate check.
    seen: HashSet<Digest>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// The empty ledger: no blocks, every account at [`INITIAL_BALANCE`].
    pub fn new() -> Self {
        Ledger::from_snapshot(LedgerSnapshot::default())
    }

    /// Rebuild from a persisted snapshot. The snapshot is trusted (it is
    /// this node's own durable state); peer chains go through [`replay`]
    /// instead.
    ///
    /// [`replay`]: Ledger::replay
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let seen = snapshot.chain.iter().map(|b| b.hash).collect();
        Ledger {
            chain: snapshot.chain,
            balances: snapshot.balances,
            seen,
        }
    }

    /// Clone out the persistable document.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            chain: self.chain.clone(),
            balances: self.balances.clone(),
        }
    }

    /// Digest of the last block, or the zero sentinel if the chain is empty.
    pub fn tip_hash(&self) -> Digest {
        self.chain.last().map(|b| b.hash).unwrap_or(Digest::ZERO)
    }

    /// Number of committed blocks; also the index of the slot currently
    /// being decided.
    pub fn depth(&self) -> u64 {
        self.chain.len() as u64
    }

    /// Balance of one account (0 for accounts outside the cluster).
    pub fn balance(&self, account: NodeId) -> u64 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    /// The full balance table.
    pub fn balances(&self) -> &BTreeMap<NodeId, u64> {
        &self.balances
    }

    /// The committed chain.
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Build a candidate block transferring `amount` from `sender` to
    /// `receiver` on top of the current tip.
    ///
    /// Validates the request, then searches for a proof-of-work nonce by
    /// drawing random alphanumeric tokens until the tag condition holds
    /// (acceptance probability ≈ 5/16 per draw). No ledger state changes;
    /// the candidate only enters the chain through consensus and
    /// [`Ledger::apply`].
    pub fn build_candidate<R: Rng>(
        &self,
        sender: NodeId,
        receiver: NodeId,
        amount: u64,
        rng: &mut R,
    ) -> Result<Block, TransferError> {
        if !self.balances.contains_key(&receiver) {
            return Err(TransferError::UnknownAccount(receiver));
        }
        if sender == receiver {
            return Err(TransferError::SelfTransfer);
        }
        if amount == 0 {
            return Err(TransferError::NonPositiveAmount);
        }
        let balance = self.balance(sender);
        if balance < amount {
            return Err(TransferError::InsufficientFunds { balance, amount });
        }

        let prev_hash = self.tip_hash();
        loop {
            let block = Block::seal(sender, receiver, amount, random_nonce(rng), prev_hash);
            if block.pow_ok() {
                debug!(
                    sender = %sender,
                    nonce = %block.nonce,
                    pow = %block.pow_digest(),
                    "proof-of-work found"
                );
                return Ok(block);
            }
        }
    }

    /// Validate `block` against the current tip and balances, then append
    /// it and move the money.
    ///
    /// Idempotent: a block whose hash is already in the chain returns
    /// [`ApplyOutcome::Duplicate`] without touching state. Any validation
    /// failure leaves the ledger unchanged.
    pub fn apply(&mut self, block: Block) -> Result<ApplyOutcome, ApplyError> {
        if self.seen.contains(&block.hash) {
            debug!(hash = %block.hash, "block already in chain, skipping");
            return Ok(ApplyOutcome::Duplicate);
        }

        if block.sender == block.receiver {
            return Err(ApplyError::SelfTransfer);
        }
        if block.amount == 0 {
            return Err(ApplyError::NonPositiveAmount);
        }

        let tip = self.tip_hash();
        if block.prev_hash != tip {
            return Err(ApplyError::PrevHashMismatch {
                expected: tip,
                got: block.prev_hash,
            });
        }
        if !block.pow_ok() {
            return Err(ApplyError::PowTagInvalid);
        }
        if block.hash != block.content_digest() {
            return Err(ApplyError::HashMismatch);
        }

        let balance = self.balance(block.sender);
        if balance < block.amount {
            return Err(ApplyError::InsufficientFunds {
                sender: block.sender,
                balance,
                amount: block.amount,
            });
        }

        // The solvency check guarantees the sender entry exists (a missing
        // account reads as balance 0, and amount is positive). The receiver
        // entry is created on first credit.
        *self.balances.entry(block.sender).or_insert(0) -= block.amount;
        *self.balances.entry(block.receiver).or_insert(0) += block.amount;
        self.seen.insert(block.hash);
        debug!(
            sender = %block.sender,
            receiver = %block.receiver,
            amount = block.amount,
            depth = self.chain.len(),
            hash = %block.hash,
            "block applied"
        );
        self.chain.push(block);
        Ok(ApplyOutcome::Applied)
    }

    /// Re-apply a peer chain from depth 0 into a fresh ledger, under the
    /// same rules as [`Ledger::apply`].
    ///
    /// This is the catch-up validation path: a chain is valid iff every
    /// block applies in order (links hold, tags hold, digests match, and
    /// every sender is solvent at its point in the replay).
    pub fn replay(chain: &[Block]) -> Result<Ledger, ChainError> {
        let mut ledger = Ledger::new();
        for (depth, block) in chain.iter().enumerate() {
            match ledger.apply(block.clone()) {
                Ok(ApplyOutcome::Applied) => {}
                // A duplicate inside a replayed chain means two blocks share
                // a hash, which a valid chain never does.
                Ok(ApplyOutcome::Duplicate) => {
                    return Err(ChainError {
                        depth,
                        source: ApplyError::HashMismatch,
                    })
                }
                Err(source) => return Err(ChainError { depth, source }),
            }
        }
        Ok(ledger)
    }

    /// Swap in a validated replacement ledger (catch-up adoption).
    pub fn replace(&mut self, other: Ledger) {
        *self = other;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paxchain_types::{all_nodes, INITIAL_BALANCE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn total(ledger: &Ledger) -> u64 {
        ledger.balances().values().sum()
    }

    #[test]
    fn starts_empty_with_initial_balances() {
        let ledger = Ledger::new();
        assert_eq!(ledger.depth(), 0);
        assert_eq!(ledger.tip_hash(), Digest::ZERO);
        for node in all_nodes() {
            assert_eq!(ledger.balance(node), INITIAL_BALANCE);
        }
    }

    #[test]
    fn candidate_applies_and_moves_money() {
        let mut ledger = Ledger::new();
        let block = ledger
            .build_candidate(NodeId(1), NodeId(2), 30, &mut rng())
            .unwrap();
        assert!(block.verify());
        assert_eq!(ledger.apply(block.clone()), Ok(ApplyOutcome::Applied));
        assert_eq!(ledger.depth(), 1);
        assert_eq!(ledger.tip_hash(), block.hash);
        assert_eq!(ledger.balance(NodeId(1)), 70);
        assert_eq!(ledger.balance(NodeId(2)), 130);
        assert_eq!(total(&ledger), 500);
    }

    #[test]
    fn apply_is_idempotent() {
        let mut ledger = Ledger::new();
        let block = ledger
            .build_candidate(NodeId(1), NodeId(2), 30, &mut rng())
            .unwrap();
        ledger.apply(block.clone()).unwrap();
        let before = ledger.snapshot();
        assert_eq!(ledger.apply(block), Ok(ApplyOutcome::Duplicate));
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn rejects_wrong_tip() {
        let mut ledger = Ledger::new();
        let a = ledger
            .build_candidate(NodeId(1), NodeId(2), 10, &mut rng())
            .unwrap();
        let b = ledger
            .build_candidate(NodeId(3), NodeId(4), 10, &mut rng())
            .unwrap();
        ledger.apply(a).unwrap();
        // b still links the empty tip.
        assert!(matches!(
            ledger.apply(b),
            Err(ApplyError::PrevHashMismatch { .. })
        ));
        assert_eq!(ledger.depth(), 1);
    }

    #[test]
    fn rejects_tampered_hash() {
        let mut ledger = Ledger::new();
        let mut block = ledger
            .build_candidate(NodeId(1), NodeId(2), 10, &mut rng())
            .unwrap();
        block.hash = Digest::of("forged");
        assert_eq!(ledger.apply(block), Err(ApplyError::HashMismatch));
    }

    #[test]
    fn rejects_insolvent_sender() {
        let mut ledger = Ledger::new();
        // Drain node 1 down to 0 in one transfer, then try to overspend.
        let drain = ledger
            .build_candidate(NodeId(1), NodeId(2), 100, &mut rng())
            .unwrap();
        ledger.apply(drain).unwrap();
        let overdraft = Block::seal(
            NodeId(1),
            NodeId(3),
            1,
            "AAAAAAAA".into(),
            ledger.tip_hash(),
        );
        let err = ledger.apply(overdraft).unwrap_err();
        // PoW may fail first for the fixed nonce; both rejections are fine,
        // but a solvent-looking error must name the right numbers.
        if let ApplyError::InsufficientFunds {
            balance, amount, ..
        } = err
        {
            assert_eq!((balance, amount), (0, 1));
        }
    }

    #[test]
    fn build_candidate_validates_request() {
        let ledger = Ledger::new();
        let mut r = rng();
        assert_eq!(
            ledger.build_candidate(NodeId(1), NodeId(2), 150, &mut r),
            Err(TransferError::InsufficientFunds {
                balance: 100,
                amount: 150
            })
        );
        assert_eq!(
            ledger.build_candidate(NodeId(1), NodeId(1), 10, &mut r),
            Err(TransferError::SelfTransfer)
        );
        assert_eq!(
            ledger.build_candidate(NodeId(1), NodeId(2), 0, &mut r),
            Err(TransferError::NonPositiveAmount)
        );
        assert_eq!(
            ledger.build_candidate(NodeId(1), NodeId(9), 10, &mut r),
            Err(TransferError::UnknownAccount(NodeId(9)))
        );
    }

    #[test]
    fn replay_accepts_own_chain() {
        let mut ledger = Ledger::new();
        let mut r = rng();
        for (to, amt) in [(2u64, 30), (3, 20), (1, 5)] {
            let block = ledger
                .build_candidate(NodeId(1), NodeId(to), amt, &mut r)
                .unwrap();
            ledger.apply(block).unwrap();
        }
        let rebuilt = Ledger::replay(ledger.chain()).unwrap();
        assert_eq!(rebuilt.snapshot(), ledger.snapshot());
    }

    #[test]
    fn replay_rejects_broken_link() {
        let mut ledger = Ledger::new();
        let mut r = rng();
        for _ in 0..2 {
            let block = ledger
                .build_candidate(NodeId(1), NodeId(2), 10, &mut r)
                .unwrap();
            ledger.apply(block).unwrap();
        }
        let mut chain = ledger.chain().to_vec();
        chain[1].prev_hash = Digest::of("severed");
        let err = Ledger::replay(&chain).unwrap_err();
        assert_eq!(err.depth, 1);
    }

    #[test]
    fn replay_rejects_insolvent_history() {
        let mut ledger = Ledger::new();
        let mut r = rng();
        let block = ledger
            .build_candidate(NodeId(1), NodeId(2), 60, &mut r)
            .unwrap();
        ledger.apply(block).unwrap();
        // Forge a second spend of 60 from node 1 (only 40 left). The forger
        // can mine valid PoW; solvency is what the replay must catch.
        let mut chain = ledger.chain().to_vec();
        let forged = ledger
            .build_candidate(NodeId(1), NodeId(3), 40, &mut r)
            .unwrap();
        let mut over = forged;
        over.amount = 60;
        // Re-mine so PoW and hash are self-consistent for the bumped amount.
        let mut rr = rng();
        let over = loop {
            let candidate = Block::seal(
                over.sender,
                over.receiver,
                over.amount,
                random_nonce(&mut rr),
                over.prev_hash,
            );
            if candidate.pow_ok() {
                break candidate;
            }
        };
        chain.push(over);
        let err = Ledger::replay(&chain).unwrap_err();
        assert_eq!(err.depth, 1);
        assert!(matches!(err.source, ApplyError::InsufficientFunds { .. }));
    }

    #[test]
    fn snapshot_round_trip() {
        let mut ledger = Ledger::new();
        let block = ledger
            .build_candidate(NodeId(2), NodeId(5), 25, &mut rng())
            .unwrap();
        ledger.apply(block).unwrap();
        let restored = Ledger::from_snapshot(ledger.snapshot());
        assert_eq!(restored.snapshot(), ledger.snapshot());
        assert_eq!(restored.tip_hash(), ledger.tip_hash());
        assert_eq!(restored.depth(), 1);
    }
}
