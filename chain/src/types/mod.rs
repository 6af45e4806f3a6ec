//! Core domain types shared by the chain engine, the peer node, and the
//! tracker's wire protocol.
//!
//! This module defines the move/transaction/block vocabulary used
//! throughout the workspace. As in the crate this was adapted from, the
//! goal is to avoid naked strings and maps in public APIs and instead use
//! small, serde-friendly newtypes and enums.

pub mod block;
pub mod tx;

pub use block::{Block, Header};
pub use tx::{Move, Transaction};

/// Length, in hex characters, of a SHA-256 digest as used throughout the
/// chain (32 bytes, 2 hex characters per byte).
pub const DIGEST_HEX_LEN: usize = 64;

/// The genesis block's `prev` value: 64 ASCII zero characters.
pub fn zero_digest() -> String {
    "0".repeat(DIGEST_HEX_LEN)
}

/// Peer identifiers are tracker-assigned integers, trusted within the LAN
/// threat model (no cryptographic peer identity; see spec Non-goals).
pub type PeerId = u64;

/// Opaque match identifier assigned by the tracker, of the form
/// `"match_N"`.
pub type MatchId = String;
