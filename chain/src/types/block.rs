// chain/src/types/block.rs

//! Block types, canonical hashing, and proof-of-work.
//!
//! A block's identity is the SHA-256 hex digest of the canonical,
//! key-sorted JSON serialization of its **header** — and the header
//! carries the transaction list directly, rather than a Merkle root. This
//! is a deliberate interop quirk (see `DESIGN.md`), preserved rather than
//! "fixed".
//!
//! Canonical JSON is produced via `serde_json::to_value` followed by
//! `to_string`: without the `preserve_order` feature, `serde_json::Map`
//! is backed by a `BTreeMap`, so object keys come out lexicographically
//! sorted with compact separators at no extra cost.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Transaction, zero_digest};

/// The proof-of-work difficulty predicate: a header hash is valid iff its
/// hex digest begins with this literal prefix.
pub const POW_PREFIX: &str = "0000";

/// Block header.
///
/// Fields are declared in the order the wire format documents them;
/// canonical hashing sorts keys independently of this declaration order,
/// so the order here only affects `Debug` output and construction
/// ergonomics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Header {
    /// Height of this block. Genesis is 0.
    pub index: u64,
    /// Hex digest of the previous block's header. Genesis uses 64 zeros.
    pub prev: String,
    /// Seconds since the Unix epoch. Genesis uses 0.
    pub timestamp: u64,
    /// Proof-of-work search counter.
    pub nonce: u64,
    /// Transactions carried by this block. Hashed as part of the header —
    /// see the module docs for why.
    pub transactions: Vec<Transaction>,
}

impl Header {
    /// Computes the canonical, key-sorted JSON encoding of this header.
    pub fn canonical_json(&self) -> String {
        let value =
            serde_json::to_value(self).expect("Header fields are always representable as JSON");
        serde_json::to_string(&value).expect("serde_json::Value always serializes")
    }

    /// Computes this header's SHA-256 hex digest.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A block: a header plus the same transaction list, duplicated at the
/// top level to match the `block_json` wire shape
/// (`{"header": {...}, "transactions": [...]}`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Builds an unmined block, keeping `header.transactions` and the
    /// top-level `transactions` field in sync.
    pub fn new(index: u64, prev: String, timestamp: u64, transactions: Vec<Transaction>) -> Self {
        let header = Header {
            index,
            prev,
            timestamp,
            nonce: 0,
            transactions: transactions.clone(),
        };
        Self {
            header,
            transactions,
        }
    }

    /// Builds the mined genesis block: index 0, 64-zero `prev`, timestamp
    /// 0, and a single `GENESIS` transaction.
    pub fn genesis() -> Self {
        let mut block = Block::new(0, zero_digest(), 0, vec![Transaction::Genesis]);
        mine(&mut block);
        block
    }

    /// This block's identity: the SHA-256 hex digest of its header.
    pub fn hash(&self) -> String {
        self.header.hash()
    }

    /// Returns `true` if this block's header hash satisfies the
    /// proof-of-work predicate.
    pub fn pow_ok(&self) -> bool {
        pow_ok(&self.hash())
    }
}

/// The proof-of-work predicate: `true` iff `digest` begins with
/// [`POW_PREFIX`].
pub fn pow_ok(digest: &str) -> bool {
    digest.starts_with(POW_PREFIX)
}

/// Mines `block` in place: increments `nonce` from 0 until `pow_ok`
/// holds for the resulting header hash.
///
/// CPU-bound and non-yielding; callers that need concurrent I/O while
/// mining must run this on a dedicated thread rather than under a shared
/// lock.
pub fn mine(block: &mut Block) {
    block.header.nonce = 0;
    while !pow_ok(&block.header.hash()) {
        block.header.nonce += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_keys_lexicographically() {
        let header = Header {
            index: 1,
            prev: zero_digest(),
            timestamp: 100,
            nonce: 0,
            transactions: vec![],
        };
        let json = header.canonical_json();
        let index_pos = json.find("\"index\"").unwrap();
        let nonce_pos = json.find("\"nonce\"").unwrap();
        let prev_pos = json.find("\"prev\"").unwrap();
        let timestamp_pos = json.find("\"timestamp\"").unwrap();
        let tx_pos = json.find("\"transactions\"").unwrap();
        assert!(index_pos < nonce_pos);
        assert!(nonce_pos < prev_pos);
        assert!(prev_pos < timestamp_pos);
        assert!(timestamp_pos < tx_pos);
        assert!(!json.contains(' '), "compact separators, no whitespace");
    }

    #[test]
    fn genesis_block_is_mined_and_well_formed() {
        let genesis = Block::genesis();
        assert_eq!(genesis.header.index, 0);
        assert_eq!(genesis.header.prev, zero_digest());
        assert_eq!(genesis.transactions, vec![Transaction::Genesis]);
        assert!(genesis.pow_ok());
    }

    #[test]
    fn mine_produces_a_hash_with_the_required_prefix() {
        let mut block = Block::new(1, zero_digest(), 0, vec![]);
        mine(&mut block);
        assert!(block.hash().starts_with(POW_PREFIX));
    }

    #[test]
    fn block_identity_is_deterministic() {
        let block = Block::genesis();
        assert_eq!(block.hash(), block.hash());
    }

    #[test]
    fn pow_ok_rejects_digests_without_the_prefix() {
        assert!(!pow_ok("1234abcd"));
        assert!(pow_ok("0000abcd"));
    }
}
