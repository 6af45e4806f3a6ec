//! Block validation against a parent header.
//!
//! Mirrors the teacher's `validation::base` shape: a handful of small,
//! named private checks composed by a single public `validate` entry
//! point, rather than one large function.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::types::{Block, Transaction};

/// Validates `block` against its claimed parent `prev`.
///
/// Checks, in order: index continuity, the `prev` link, proof-of-work,
/// and per-match transaction-set integrity (reveal/commit binding and
/// declared-result correctness).
pub fn validate(block: &Block, prev: &Block) -> Result<(), ValidationError> {
    check_index(block, prev)?;
    check_prev_link(block, prev)?;
    check_pow(block)?;
    check_match_groups(block)?;
    Ok(())
}

fn check_index(block: &Block, prev: &Block) -> Result<(), ValidationError> {
    let expected = prev.header.index + 1;
    if block.header.index != expected {
        return Err(ValidationError::BadIndex {
            expected,
            got: block.header.index,
        });
    }
    Ok(())
}

fn check_prev_link(block: &Block, prev: &Block) -> Result<(), ValidationError> {
    let expected = prev.hash();
    if block.header.prev != expected {
        return Err(ValidationError::BadPrev {
            expected,
            got: block.header.prev.clone(),
        });
    }
    Ok(())
}

fn check_pow(block: &Block) -> Result<(), ValidationError> {
    if !block.pow_ok() {
        return Err(ValidationError::PowFailed { hash: block.hash() });
    }
    Ok(())
}

fn commit_key_hash(mv_str: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mv_str.as_bytes());
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn check_match_groups(block: &Block) -> Result<(), ValidationError> {
    let mut groups: HashMap<&str, Vec<&Transaction>> = HashMap::new();
    for tx in &block.transactions {
        if let Some(match_id) = tx.match_id() {
            groups.entry(match_id).or_default().push(tx);
        }
    }

    for (match_id, txs) in groups {
        let mut commits: HashMap<u64, &str> = HashMap::new();
        let mut reveals: Vec<(u64, crate::types::Move, &str)> = Vec::new();
        let mut result: Option<(u64, bool)> = None;

        for tx in &txs {
            match tx {
                Transaction::Commit { peer, hash, .. } => {
                    commits.insert(*peer, hash.as_str());
                }
                Transaction::Reveal { peer, mv, key, .. } => {
                    reveals.push((*peer, *mv, key.as_str()));
                }
                Transaction::Result { winner, tie, .. } => {
                    result = Some((*winner, *tie));
                }
                Transaction::Genesis => {}
            }
        }

        for (peer, mv, key) in &reveals {
            let expected_hash = commits.get(peer);
            let recomputed = commit_key_hash(mv.as_str(), key);
            if expected_hash != Some(&recomputed.as_str()) {
                return Err(ValidationError::UnmatchedReveal {
                    match_id: match_id.to_string(),
                    peer: *peer,
                });
            }
        }

        if reveals.len() == 2 {
            if let Some((declared_winner, declared_tie)) = result {
                let mut sorted = reveals.clone();
                sorted.sort_by_key(|(peer, _, _)| *peer);
                let (p1, m1, _) = sorted[0];
                let (p2, m2, _) = sorted[1];

                let (expected_winner, expected_tie) = match m1.beats(&m2) {
                    None => (0, true),
                    Some(true) => (p1, false),
                    Some(false) => (p2, false),
                };

                if (declared_winner, declared_tie) != (expected_winner, expected_tie) {
                    return Err(ValidationError::BadResult {
                        match_id: match_id.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Move, Transaction};

    fn commit_for(match_id: &str, peer: u64, mv: Move, key: &str) -> Transaction {
        Transaction::Commit {
            match_id: match_id.to_string(),
            peer,
            hash: commit_key_hash(mv.as_str(), key),
        }
    }

    fn reveal_for(match_id: &str, peer: u64, mv: Move, key: &str) -> Transaction {
        Transaction::Reveal {
            match_id: match_id.to_string(),
            peer,
            mv,
            key: key.to_string(),
        }
    }

    fn genesis_and_child(txs: Vec<Transaction>) -> (Block, Block) {
        let genesis = Block::genesis();
        let mut child = Block::new(1, genesis.hash(), 1, txs);
        crate::types::block::mine(&mut child);
        (genesis, child)
    }

    #[test]
    fn accepts_a_well_formed_full_match() {
        let txs = vec![
            commit_for("match_1", 1, Move::Rock, "key1"),
            commit_for("match_1", 2, Move::Scissors, "key2"),
            reveal_for("match_1", 1, Move::Rock, "key1"),
            reveal_for("match_1", 2, Move::Scissors, "key2"),
            Transaction::Result {
                match_id: "match_1".to_string(),
                winner: 1,
                tie: false,
            },
        ];
        let (genesis, child) = genesis_and_child(txs);
        assert!(validate(&child, &genesis).is_ok());
    }

    #[test]
    fn rejects_reveal_with_wrong_key() {
        let txs = vec![
            commit_for("match_1", 1, Move::Rock, "key1"),
            reveal_for("match_1", 1, Move::Paper, "key1"),
        ];
        let (genesis, child) = genesis_and_child(txs);
        let err = validate(&child, &genesis).unwrap_err();
        assert!(matches!(err, ValidationError::UnmatchedReveal { .. }));
    }

    #[test]
    fn rejects_wrong_declared_winner() {
        let txs = vec![
            commit_for("match_2", 1, Move::Rock, "k1"),
            commit_for("match_2", 2, Move::Scissors, "k2"),
            reveal_for("match_2", 1, Move::Rock, "k1"),
            reveal_for("match_2", 2, Move::Scissors, "k2"),
            Transaction::Result {
                match_id: "match_2".to_string(),
                winner: 2,
                tie: false,
            },
        ];
        let (genesis, child) = genesis_and_child(txs);
        let err = validate(&child, &genesis).unwrap_err();
        assert!(matches!(err, ValidationError::BadResult { .. }));
    }

    #[test]
    fn partial_match_without_result_is_permitted() {
        let txs = vec![commit_for("match_3", 1, Move::Rock, "k1")];
        let (genesis, child) = genesis_and_child(txs);
        assert!(validate(&child, &genesis).is_ok());
    }

    #[test]
    fn rejects_bad_index() {
        let genesis = Block::genesis();
        let mut child = Block::new(5, genesis.hash(), 1, vec![]);
        crate::types::block::mine(&mut child);
        let err = validate(&child, &genesis).unwrap_err();
        assert!(matches!(err, ValidationError::BadIndex { .. }));
    }

    #[test]
    fn rejects_bad_prev_link() {
        let genesis = Block::genesis();
        let mut child = Block::new(1, "f".repeat(64), 1, vec![]);
        crate::types::block::mine(&mut child);
        let err = validate(&child, &genesis).unwrap_err();
        assert!(matches!(err, ValidationError::BadPrev { .. }));
    }
}
