//! Tracker state: the peer registry, idle pool, per-peer chain snapshots,
//! and match logs, all behind one `std::sync::Mutex` (spec §4.3, §5).
//!
//! Grounded on the teacher's `AppState`/`SharedState` shape (one struct
//! behind an `Arc`, handed to both the registration threads and the HTTP
//! handlers), generalized from a single `tokio::sync::Mutex`-guarded
//! consensus engine to a `std::sync::Mutex`-guarded registry, since the
//! registration/matchmaking side here runs on blocking OS threads rather
//! than async tasks.

use std::collections::BTreeMap;
use std::io;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use rand::Rng;
use rand::seq::SliceRandom;
use rand::thread_rng;

use chain::{Block, PeerId, PeerInfo, TrackerMessage, write_json_line};

/// A registered peer's address and the socket used to push it
/// tracker-originated messages (`peer_id`, `network_update`,
/// `match_start`).
pub struct PeerRecord {
    pub address: String,
    pub game_port: u16,
    writer: Mutex<TcpStream>,
}

impl PeerRecord {
    /// Sends `msg` to this peer, serialized against concurrent senders
    /// (the registration thread and the matchmaking worker can both write
    /// to the same peer).
    pub fn send(&self, msg: &TrackerMessage) -> io::Result<()> {
        let mut writer = self.writer.lock().expect("peer writer lock poisoned");
        write_json_line(&mut *writer, msg)
    }
}

/// The tracker's mutable state, held behind one lock for the whole node.
#[derive(Default)]
pub struct TrackerState {
    pub registry: BTreeMap<PeerId, Arc<PeerRecord>>,
    pub idle: Vec<PeerId>,
    pub per_peer_chains: BTreeMap<PeerId, Vec<Block>>,
    pub match_logs: Vec<String>,
    next_peer_id: PeerId,
    next_match_id: u64,
}

impl TrackerState {
    pub fn new() -> Self {
        Self {
            next_peer_id: 1,
            ..Default::default()
        }
    }

    /// Registers a freshly connected peer, assigning it the next
    /// monotonically increasing `peer_id` and adding it to the idle pool
    /// (spec §4.3 "Registration").
    pub fn register(&mut self, address: String, game_port: u16, stream: TcpStream) -> (PeerId, Arc<PeerRecord>) {
        let peer_id = self.next_peer_id;
        self.next_peer_id += 1;

        let record = Arc::new(PeerRecord {
            address,
            game_port,
            writer: Mutex::new(stream),
        });
        self.registry.insert(peer_id, record.clone());
        self.idle.push(peer_id);
        (peer_id, record)
    }

    /// Removes a peer from the registry and the idle pool on socket
    /// error/EOF (spec §4.3 "Failure").
    pub fn remove(&mut self, peer_id: PeerId) {
        self.registry.remove(&peer_id);
        self.idle.retain(|&id| id != peer_id);
        self.per_peer_chains.remove(&peer_id);
    }

    /// Builds the wire-shaped peer directory from the current registry.
    pub fn directory(&self) -> BTreeMap<PeerId, PeerInfo> {
        self.registry
            .iter()
            .map(|(&id, record)| {
                (
                    id,
                    PeerInfo {
                        address: record.address.clone(),
                        port: record.game_port,
                    },
                )
            })
            .collect()
    }

    /// Shuffles the idle pool and pops as many disjoint pairs as it can,
    /// removing the paired peers from `idle` (spec §4.3 "Matchmaking
    /// loop"). An odd peer out stays idle for the next round.
    pub fn drain_idle_pairs(&mut self) -> Vec<(PeerId, PeerId)> {
        self.drain_idle_pairs_with(&mut thread_rng())
    }

    /// Same as [`Self::drain_idle_pairs`] but shuffles with a caller-supplied
    /// RNG, so a seeded `StdRng` can exercise deterministic pairing in tests.
    pub fn drain_idle_pairs_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<(PeerId, PeerId)> {
        self.idle.shuffle(rng);
        let mut pairs = Vec::new();
        while self.idle.len() >= 2 {
            let a = self.idle.pop().expect("len checked above");
            let b = self.idle.pop().expect("len checked above");
            pairs.push((a, b));
        }
        pairs
    }

    /// Allocates the next `match_N` identifier.
    pub fn next_match_id(&mut self) -> String {
        self.next_match_id += 1;
        format!("match_{}", self.next_match_id)
    }

    /// Returns a peer to the idle pool after it reports `game_end` (spec
    /// §4.3 "Liveness": not returned until this message arrives).
    pub fn return_to_idle(&mut self, peer_id: PeerId) {
        if self.registry.contains_key(&peer_id) && !self.idle.contains(&peer_id) {
            self.idle.push(peer_id);
        }
    }

    pub fn record_chain(&mut self, peer_id: PeerId, blocks: Vec<Block>) {
        self.per_peer_chains.insert(peer_id, blocks);
    }

    pub fn push_log(&mut self, entry: String) {
        self.match_logs.push(entry);
    }
}

/// Thread-safe alias for [`TrackerState`], shared by the registration
/// threads, the matchmaking loop, and the snapshot HTTP handlers.
pub type SharedState = Arc<Mutex<TrackerState>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn register_assigns_monotonic_ids_and_joins_idle_pool() {
        let mut state = TrackerState::new();
        let (a, _a_peer) = loopback_pair();
        let (b, _b_peer) = loopback_pair();
        let (id1, _) = state.register("127.0.0.1".to_string(), 9100, a);
        let (id2, _) = state.register("127.0.0.1".to_string(), 9101, b);
        assert_eq!((id1, id2), (1, 2));
        assert_eq!(state.idle, vec![1, 2]);
    }

    #[test]
    fn drain_idle_pairs_consumes_pairs_and_leaves_odd_peer_idle() {
        let mut state = TrackerState::new();
        state.idle = vec![1, 2, 3];
        let pairs = state.drain_idle_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(state.idle.len(), 1);
    }

    #[test]
    fn drain_idle_pairs_with_is_deterministic_given_a_seeded_rng() {
        let mut state_a = TrackerState::new();
        state_a.idle = vec![1, 2, 3, 4, 5];
        let pairs_a = state_a.drain_idle_pairs_with(&mut StdRng::seed_from_u64(42));

        let mut state_b = TrackerState::new();
        state_b.idle = vec![1, 2, 3, 4, 5];
        let pairs_b = state_b.drain_idle_pairs_with(&mut StdRng::seed_from_u64(42));

        assert_eq!(pairs_a, pairs_b);
        assert_eq!(state_a.idle, state_b.idle);
    }

    #[test]
    fn next_match_id_is_monotonic() {
        let mut state = TrackerState::new();
        assert_eq!(state.next_match_id(), "match_1");
        assert_eq!(state.next_match_id(), "match_2");
    }

    #[test]
    fn return_to_idle_ignores_unregistered_or_duplicate_peers() {
        let mut state = TrackerState::new();
        let (a, _a_peer) = loopback_pair();
        let (id, _) = state.register("127.0.0.1".to_string(), 9100, a);
        state.idle.clear();
        state.return_to_idle(id);
        state.return_to_idle(id);
        assert_eq!(state.idle, vec![id]);
        state.return_to_idle(999);
        assert_eq!(state.idle, vec![id]);
    }

    #[test]
    fn remove_clears_registry_idle_and_chain_snapshot() {
        let mut state = TrackerState::new();
        let (a, _a_peer) = loopback_pair();
        let (id, _) = state.register("127.0.0.1".to_string(), 9100, a);
        state.record_chain(id, vec![Block::genesis()]);
        state.remove(id);
        assert!(!state.registry.contains_key(&id));
        assert!(!state.idle.contains(&id));
        assert!(!state.per_peer_chains.contains_key(&id));
    }
}
