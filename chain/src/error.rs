//! Error types for block validation and chain mutation.

use std::fmt;

/// Error returned when a block fails validation against a parent.
#[derive(Debug)]
pub enum ValidationError {
    /// Index does not follow the parent's index by exactly one.
    BadIndex { expected: u64, got: u64 },
    /// `prev` does not match the parent's header hash.
    BadPrev { expected: String, got: String },
    /// Header hash does not satisfy the proof-of-work predicate.
    PowFailed { hash: String },
    /// A reveal has no matching commit, or its hash disagrees with the
    /// commit it claims to open.
    UnmatchedReveal { match_id: String, peer: u64 },
    /// A full match's declared `(winner, tie)` disagrees with the
    /// recomputed rock-paper-scissors outcome.
    BadResult { match_id: String },
}

/// High-level errors from chain mutation.
#[derive(Debug)]
pub enum ChainError {
    /// Underlying validation failure.
    Validation(ValidationError),
    /// The chain's structural self-check failed (index/prev/PoW/uniqueness).
    SelfCheckFailed(String),
}

impl From<ValidationError> for ChainError {
    fn from(e: ValidationError) -> Self {
        ChainError::Validation(e)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BadIndex { expected, got } => {
                write!(f, "bad index: expected {expected}, got {got}")
            }
            ValidationError::BadPrev { expected, got } => {
                write!(f, "bad prev: expected {expected}, got {got}")
            }
            ValidationError::PowFailed { hash } => {
                write!(f, "proof-of-work check failed for hash {hash}")
            }
            ValidationError::UnmatchedReveal { match_id, peer } => {
                write!(f, "unmatched or wrong-hashed reveal for {match_id}/{peer}")
            }
            ValidationError::BadResult { match_id } => {
                write!(f, "declared result disagrees with recomputed outcome for {match_id}")
            }
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Validation(e) => write!(f, "{e}"),
            ChainError::SelfCheckFailed(msg) => write!(f, "chain self-check failed: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for ChainError {}
