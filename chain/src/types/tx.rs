// chain/src/types/tx.rs

//! Transaction types for the match ledger.
//!
//! A match between two peers produces a short-lived sequence of
//! transactions: a `COMMIT` per peer, a `REVEAL` per peer opening that
//! commitment, and a `RESULT` declaring the outcome. `GENESIS` is the
//! single marker transaction that seeds the first block. The wire
//! representation externally tags on a `type` field (`COMMIT`, `REVEAL`,
//! `RESULT`, `GENESIS`) to match the tracker/peer protocol.

use serde::{Deserialize, Serialize};

use super::{MatchId, PeerId};

/// A rock-paper-scissors move.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    /// All three moves, in a fixed order, for uniform random selection.
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// Returns this move's wire string (`"rock"`, `"paper"`, `"scissors"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }

    /// Applies the rock-paper-scissors table: `rock > scissors > paper >
    /// rock`. Returns `Some(true)` if `self` beats `other`, `Some(false)`
    /// if `other` beats `self`, and `None` on a tie.
    pub fn beats(&self, other: &Move) -> Option<bool> {
        if self == other {
            return None;
        }
        let wins = matches!(
            (self, other),
            (Move::Rock, Move::Scissors) | (Move::Scissors, Move::Paper) | (Move::Paper, Move::Rock)
        );
        Some(wins)
    }
}

/// A transaction recorded in a block.
///
/// `match_id`/`peer` pairs tie `Commit`/`Reveal`/`Result` entries for the
/// same match together; see [`crate::engine::validate`] for the rules
/// that relate them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Transaction {
    #[serde(rename = "GENESIS")]
    Genesis,

    #[serde(rename = "COMMIT")]
    Commit {
        match_id: MatchId,
        peer: PeerId,
        hash: String,
    },

    #[serde(rename = "REVEAL")]
    Reveal {
        match_id: MatchId,
        peer: PeerId,
        #[serde(rename = "move")]
        mv: Move,
        key: String,
    },

    #[serde(rename = "RESULT")]
    Result {
        match_id: MatchId,
        winner: PeerId,
        tie: bool,
    },
}

impl Transaction {
    /// The `match_id` this transaction belongs to, if any (`Genesis`
    /// carries none and is excluded from match-group validation).
    pub fn match_id(&self) -> Option<&str> {
        match self {
            Transaction::Genesis => None,
            Transaction::Commit { match_id, .. }
            | Transaction::Reveal { match_id, .. }
            | Transaction::Result { match_id, .. } => Some(match_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_beats_table_matches_rock_paper_scissors() {
        assert_eq!(Move::Rock.beats(&Move::Scissors), Some(true));
        assert_eq!(Move::Scissors.beats(&Move::Paper), Some(true));
        assert_eq!(Move::Paper.beats(&Move::Rock), Some(true));
        assert_eq!(Move::Scissors.beats(&Move::Rock), Some(false));
        assert_eq!(Move::Rock.beats(&Move::Rock), None);
    }

    #[test]
    fn commit_roundtrips_through_json_with_tagged_type() {
        let tx = Transaction::Commit {
            match_id: "match_1".to_string(),
            peer: 1,
            hash: "deadbeef".to_string(),
        };

        let json = serde_json::to_string(&tx).expect("serialize commit");
        assert!(json.contains("\"type\":\"COMMIT\""));

        let decoded: Transaction = serde_json::from_str(&json).expect("deserialize commit");
        assert_eq!(decoded, tx);
    }

    #[test]
    fn reveal_uses_move_field_name_on_the_wire() {
        let tx = Transaction::Reveal {
            match_id: "match_2".to_string(),
            peer: 2,
            mv: Move::Paper,
            key: "abcd1234".to_string(),
        };

        let json = serde_json::to_string(&tx).expect("serialize reveal");
        assert!(json.contains("\"move\":\"paper\""));
    }

    #[test]
    fn genesis_match_id_is_none() {
        assert_eq!(Transaction::Genesis.match_id(), None);
    }
}
