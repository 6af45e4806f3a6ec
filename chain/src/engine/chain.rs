//! The chain engine: an ordered block sequence plus the `add` protocol.
//!
//! `Chain` is deliberately not internally synchronized — the spec places
//! the single coordination lock on the peer node that owns an instance,
//! not on the engine itself, so concurrent access must be arbitrated by
//! the caller.

use crate::engine::outcome::AddOutcome;
use crate::engine::validate::validate;
use crate::error::ChainError;
use crate::types::Block;

/// An ordered sequence of blocks, starting from a mined genesis.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Builds a fresh chain containing only a freshly mined genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// The chain's current height: `len() - 1`.
    pub fn height(&self) -> u64 {
        (self.blocks.len() - 1) as u64
    }

    /// The current last block.
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("chain always has at least genesis")
    }

    /// The genesis (index 0) block.
    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    /// All blocks, in order, index 0 first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Replaces the entire chain wholesale, e.g. after adopting a
    /// `CHAIN_RESPONSE`. Callers are responsible for validating the
    /// replacement end-to-end (via [`Self::self_check`]) before calling
    /// this, per the canonical resolution of the open question on
    /// `CHAIN_RESPONSE` adoption.
    pub fn replace(&mut self, blocks: Vec<Block>) {
        self.blocks = blocks;
    }

    /// Implements the `add` protocol of the chain engine:
    ///
    /// - **Linear extension**: `blk.prev == H(tip)` and `valid(blk, tip)`
    ///   → append, return [`AddOutcome::Appended`].
    /// - **Depth-1 fork**: chain length ≥ 2, `blk.prev == H(chain[-2])`,
    ///   and `valid(blk, chain[-2])` → replace the tip iff
    ///   `H(blk) < H(tip)` (lexicographic), returning
    ///   [`AddOutcome::Reorganized`] on replacement or
    ///   [`AddOutcome::Appended`] when the fork candidate loses the
    ///   tie-break (the tip is unchanged, but the proposal was handled —
    ///   see `DESIGN.md`'s open-question resolution).
    /// - Anything else → [`AddOutcome::Rejected`].
    pub fn add(&mut self, blk: Block) -> AddOutcome {
        let tip = self.tip();
        let tip_hash = tip.hash();

        if blk.header.prev == tip_hash {
            let tip_clone = tip.clone();
            if validate(&blk, &tip_clone).is_ok() {
                self.blocks.push(blk);
                return AddOutcome::Appended;
            }
            return AddOutcome::Rejected;
        }

        if self.blocks.len() >= 2 {
            let grandparent = &self.blocks[self.blocks.len() - 2];
            let grandparent_hash = grandparent.hash();
            if blk.header.prev == grandparent_hash {
                let grandparent_clone = grandparent.clone();
                if validate(&blk, &grandparent_clone).is_ok() {
                    let challenger_hash = blk.hash();
                    if challenger_hash < tip_hash {
                        let last = self.blocks.len() - 1;
                        self.blocks[last] = blk;
                        return AddOutcome::Reorganized;
                    }
                    return AddOutcome::Appended;
                }
                return AddOutcome::Rejected;
            }
        }

        AddOutcome::Rejected
    }

    /// Re-verifies testable property 1 over the entire chain: genesis
    /// shape, index/prev-link continuity, proof-of-work, and header-hash
    /// uniqueness. Used by the peer when it suspects its local chain is
    /// corrupt and must request a full resync.
    pub fn self_check(&self) -> Result<(), ChainError> {
        let genesis = self.genesis();
        if genesis.header.index != 0 {
            return Err(ChainError::SelfCheckFailed(
                "genesis index is not 0".to_string(),
            ));
        }
        if genesis.header.prev != crate::types::zero_digest() {
            return Err(ChainError::SelfCheckFailed(
                "genesis prev is not all zeros".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, block) in self.blocks.iter().enumerate() {
            let hash = block.hash();
            if block.header.index != i as u64 {
                return Err(ChainError::SelfCheckFailed(format!(
                    "block at position {i} has index {}",
                    block.header.index
                )));
            }
            if i > 0 {
                let prev_hash = self.blocks[i - 1].hash();
                if block.header.prev != prev_hash {
                    return Err(ChainError::SelfCheckFailed(format!(
                        "block {i} prev link does not match block {}'s hash",
                        i - 1
                    )));
                }
            }
            if !block.pow_ok() {
                return Err(ChainError::SelfCheckFailed(format!(
                    "block {i} fails the proof-of-work predicate"
                )));
            }
            if !seen.insert(hash) {
                return Err(ChainError::SelfCheckFailed(format!(
                    "duplicate header hash at block {i}"
                )));
            }
        }

        Ok(())
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
