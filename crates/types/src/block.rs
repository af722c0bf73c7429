//! Ledger blocks and the proof-of-work tag.

use crate::{Digest, NodeId, NONCE_LEN};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One committed transfer.
///
/// Identity is fully determined by content: `hash` commits to the transfer,
/// the nonce, and the predecessor digest, so equal blocks are byte-equal on
/// the wire and tampering breaks the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Paying account.
    pub sender: NodeId,
    /// Receiving account.
    pub receiver: NodeId,
    /// Transferred amount, strictly positive.
    pub amount: u64,
    /// 8-character alphanumeric proof-of-work token.
    pub nonce: String,
    /// Digest of the predecessor block, or [`Digest::ZERO`] at depth 0.
    pub prev_hash: Digest,
    /// Digest over `(sender, receiver, amount, nonce, prev_hash)`.
    pub hash: Digest,
}

impl Block {
    /// Assemble a block, computing its content digest.
    pub fn seal(
        sender: NodeId,
        receiver: NodeId,
        amount: u64,
        nonce: String,
        prev_hash: Digest,
    ) -> Self {
        let mut block = Block {
            sender,
            receiver,
            amount,
            nonce,
            prev_hash,
            hash: Digest::ZERO,
        };
        block.hash = block.content_digest();
        block
    }

    /// The transfer-plus-nonce preimage: `sender ∥ receiver ∥ amount ∥ nonce`
    /// as decimal text, no separators.
    fn pow_preimage(&self) -> String {
        format!("{}{}{}{}", self.sender, self.receiver, self.amount, self.nonce)
    }

    /// The proof-of-work digest (excludes `prev_hash`).
    pub fn pow_digest(&self) -> Digest {
        Digest::of(self.pow_preimage())
    }

    /// Whether the proof-of-work tag holds for this block's nonce.
    pub fn pow_ok(&self) -> bool {
        self.pow_digest().pow_tag_ok()
    }

    /// Recompute the block digest from its fields.
    pub fn content_digest(&self) -> Digest {
        Digest::of(format!("{}{}", self.pow_preimage(), self.prev_hash))
    }

    /// Structural validity: distinct accounts, positive amount.
    pub fn well_formed(&self) -> bool {
        self.sender != self.receiver && self.amount > 0
    }

    /// Full self-check: structure, proof-of-work, and stored digest.
    pub fn verify(&self) -> bool {
        self.well_formed() && self.pow_ok() && self.hash == self.content_digest()
    }

    /// Rebind this block to a new predecessor.
    ///
    /// The transfer and nonce are unchanged (the proof-of-work preimage does
    /// not include `prev_hash`), so the tag stays valid; only the block
    /// digest is recomputed. Used when a proposal must be re-issued after
    /// the ledger tip moved underneath it.
    pub fn rechain(&self, prev_hash: Digest) -> Block {
        Block::seal(
            self.sender,
            self.receiver,
            self.amount,
            self.nonce.clone(),
            prev_hash,
        )
    }
}

/// Draw one candidate nonce: [`NONCE_LEN`] alphanumeric characters.
pub fn random_nonce<R: Rng>(rng: &mut R) -> String {
    (0..NONCE_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}
