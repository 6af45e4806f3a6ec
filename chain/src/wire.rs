//! The peer/tracker wire protocol: newline-delimited JSON objects, each
//! tagged on a `type` field (spec §6).
//!
//! Two independent tagged enums cover the two channels:
//!
//! - [`TrackerMessage`] — peer↔tracker (`init`, `peer_id`,
//!   `network_update`, `match_start`, `game_end`, `blockchain_update`).
//! - [`PeerMessage`] — peer↔peer (`COMMIT`, `REVEAL`, `RESULT`,
//!   `BLOCK_PROPOSAL`, `CHAIN_REQUEST`, `CHAIN_RESPONSE`).
//!
//! `PeerMessage`'s `Commit`/`Reveal`/`Result` variants mirror
//! [`crate::types::Transaction`]'s shape exactly (same field names, same
//! `type` tag strings) since a match's commit/reveal/result traffic is
//! the same data whether it is sitting in a block or in flight on the
//! wire; [`PeerMessage::from_transaction`] and
//! [`PeerMessage::into_transaction`] convert between the two without
//! re-deriving the match rules.
//!
//! A block embedded in `BLOCK_PROPOSAL`/`CHAIN_RESPONSE` is carried as a
//! plain nested JSON object (`Block`'s own derived `Serialize`), not as a
//! JSON string re-encoding a block — a typed-Rust simplification of the
//! historical `block_json` string wrapper noted in `DESIGN.md`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Block, Move, PeerId, Transaction};

/// A peer's address and game-server port, as published in
/// [`TrackerMessage::NetworkUpdate`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub address: String,
    pub port: u16,
}

/// Builds the wire-shaped `{id(str) -> PeerInfo}` map from a
/// `PeerId`-keyed directory.
pub fn directory_to_wire(directory: &BTreeMap<PeerId, PeerInfo>) -> BTreeMap<String, PeerInfo> {
    directory
        .iter()
        .map(|(id, info)| (id.to_string(), info.clone()))
        .collect()
}

/// Parses the wire-shaped `{id(str) -> PeerInfo}` map back into a
/// `PeerId`-keyed directory, skipping any entry whose key is not a valid
/// `PeerId` (a malformed peer would have been rejected at registration).
pub fn directory_from_wire(wire: BTreeMap<String, PeerInfo>) -> BTreeMap<PeerId, PeerInfo> {
    wire.into_iter()
        .filter_map(|(id, info)| id.parse::<PeerId>().ok().map(|id| (id, info)))
        .collect()
}

/// Messages exchanged between a peer and the tracker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackerMessage {
    /// peer→tracker: announces the peer's game-server port on connect.
    #[serde(rename = "init")]
    Init { game_port: u16 },

    /// tracker→peer: the peer's freshly assigned identifier.
    #[serde(rename = "peer_id")]
    PeerId { peer_id: PeerId },

    /// tracker→peer: the current peer directory.
    #[serde(rename = "network_update")]
    NetworkUpdate {
        peers: BTreeMap<String, PeerInfo>,
    },

    /// tracker→peer: pairs this peer into a new match.
    #[serde(rename = "match_start")]
    MatchStart {
        match_id: String,
        opponent_id: PeerId,
        opponent_addr: String,
        opponent_game_port: u16,
    },

    /// peer→tracker: signals match completion; returns the peer to the
    /// idle pool.
    #[serde(rename = "game_end")]
    GameEnd {
        peer_id: PeerId,
        opponent_id: PeerId,
        match_id: String,
        match_log: String,
    },

    /// peer→tracker: overwrites this peer's chain snapshot.
    #[serde(rename = "blockchain_update")]
    BlockchainUpdate {
        peer_id: PeerId,
        local_blockchain: Vec<Block>,
    },
}

/// Messages exchanged directly between two peers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    #[serde(rename = "COMMIT")]
    Commit {
        match_id: String,
        peer: PeerId,
        hash: String,
    },

    #[serde(rename = "REVEAL")]
    Reveal {
        match_id: String,
        peer: PeerId,
        #[serde(rename = "move")]
        mv: Move,
        key: String,
    },

    /// Declared only in the wire schema (spec §6); never sent standalone
    /// — the result is disseminated solely via the mined block (§4.2
    /// step 6).
    #[serde(rename = "RESULT")]
    Result {
        match_id: String,
        winner: PeerId,
        tie: bool,
    },

    /// Announces a mined (or re-mined) block to every other peer.
    #[serde(rename = "BLOCK_PROPOSAL")]
    BlockProposal { peer: PeerId, block: Block },

    /// Requests a full chain resync after a local self-check failure.
    #[serde(rename = "CHAIN_REQUEST")]
    ChainRequest {
        from_peer: PeerId,
        reply_addr: String,
        reply_port: u16,
    },

    /// Answers a `CHAIN_REQUEST` with the responder's full chain.
    #[serde(rename = "CHAIN_RESPONSE")]
    ChainResponse { chain: Vec<Block>, from_peer: PeerId },
}

impl PeerMessage {
    /// Builds the wire message for a match transaction (`Commit`,
    /// `Reveal`, or `Result`). Returns `None` for `Transaction::Genesis`,
    /// which never crosses the peer-to-peer channel.
    pub fn from_transaction(tx: &Transaction) -> Option<Self> {
        match tx.clone() {
            Transaction::Commit {
                match_id,
                peer,
                hash,
            } => Some(PeerMessage::Commit {
                match_id,
                peer,
                hash,
            }),
            Transaction::Reveal {
                match_id,
                peer,
                mv,
                key,
            } => Some(PeerMessage::Reveal {
                match_id,
                peer,
                mv,
                key,
            }),
            Transaction::Result {
                match_id,
                winner,
                tie,
            } => Some(PeerMessage::Result {
                match_id,
                winner,
                tie,
            }),
            Transaction::Genesis => None,
        }
    }

    /// Recovers the match transaction carried by this message, if this
    /// variant is `Commit`/`Reveal`/`Result`.
    pub fn into_transaction(self) -> Option<Transaction> {
        match self {
            PeerMessage::Commit {
                match_id,
                peer,
                hash,
            } => Some(Transaction::Commit {
                match_id,
                peer,
                hash,
            }),
            PeerMessage::Reveal {
                match_id,
                peer,
                mv,
                key,
            } => Some(Transaction::Reveal {
                match_id,
                peer,
                mv,
                key,
            }),
            PeerMessage::Result {
                match_id,
                winner,
                tie,
            } => Some(Transaction::Result {
                match_id,
                winner,
                tie,
            }),
            PeerMessage::BlockProposal { .. }
            | PeerMessage::ChainRequest { .. }
            | PeerMessage::ChainResponse { .. } => None,
        }
    }
}
