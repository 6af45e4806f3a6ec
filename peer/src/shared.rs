//! The peer's single coordination lock and the state it protects (spec
//! §3 "Peer state", §5 "Shared state and its guardian").
//!
//! One `Mutex` + one `Condvar` protects the entire tuple `(chain,
//! buffer, pending, commits, should_broadcast, current_match)`, plus the
//! peer directory — grounded on the `Mutex`/`Condvar` pairing the
//! pack's `job_pool` crate uses to gate a shared queue, generalized here
//! to gate the peer's whole mutable state rather than just a worklist.

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::{Condvar, Mutex, OnceLock};
use std::time::Duration;

use chain::{Block, Chain, MetricsRegistry, PeerId, PeerInfo, Transaction, TrackerMessage};

use crate::config::PeerConfig;
use crate::error::PeerError;

/// Identifies the match this peer is currently playing, if any.
#[derive(Clone, Debug)]
pub struct MatchContext {
    pub match_id: String,
    pub opponent_id: PeerId,
}

/// The mutable state guarded by [`PeerShared`]'s lock.
pub struct Inner {
    pub chain: Chain,
    pub buffer: Vec<Transaction>,
    pub pending: Vec<Block>,
    /// `(match_id, peer) -> commit hash`, used to verify incoming reveals.
    pub commits: BTreeMap<(String, PeerId), String>,
    pub should_broadcast: bool,
    pub current_match: Option<MatchContext>,
    pub directory: BTreeMap<PeerId, PeerInfo>,
}

impl Inner {
    fn new() -> Self {
        Self {
            chain: Chain::new(),
            buffer: Vec::new(),
            pending: Vec::new(),
            commits: BTreeMap::new(),
            should_broadcast: false,
            current_match: None,
            directory: BTreeMap::new(),
        }
    }

    /// Appends `tx` to the buffer, additionally indexing it in `commits`
    /// if it is a `Commit`.
    pub fn push_tx(&mut self, tx: Transaction) {
        if let Transaction::Commit {
            match_id,
            peer,
            hash,
        } = &tx
        {
            self.commits
                .insert((match_id.clone(), *peer), hash.clone());
        }
        self.buffer.push(tx);
    }

    /// Removes from `buffer` every transaction that appears in `accepted`
    /// (spec §3 `_clean_buffer`, §9.3: only transactions *in* the
    /// accepted block are pruned — the rest waits for the next block).
    pub fn clean_buffer(&mut self, accepted: &[Transaction]) {
        self.buffer.retain(|tx| !accepted.contains(tx));
    }

    /// `true` if the buffer holds a `Commit` from `peer` for `match_id`.
    pub fn has_commit_from(&self, match_id: &str, peer: PeerId) -> bool {
        self.buffer.iter().any(|tx| {
            matches!(tx, Transaction::Commit { match_id: m, peer: p, .. } if m == match_id && *p == peer)
        })
    }

    /// Returns the opponent's revealed move for `match_id`, if present in
    /// the buffer.
    pub fn reveal_from(&self, match_id: &str, peer: PeerId) -> Option<chain::Move> {
        self.buffer.iter().find_map(|tx| match tx {
            Transaction::Reveal {
                match_id: m,
                peer: p,
                mv,
                ..
            } if m == match_id && *p == peer => Some(*mv),
            _ => None,
        })
    }
}

/// Shared state for one peer node, plus the handle used to talk back to
/// the tracker.
pub struct PeerShared {
    pub peer_id: OnceLock<PeerId>,
    pub game_host: String,
    pub game_port: u16,
    pub config: PeerConfig,
    pub metrics: MetricsRegistry,
    tracker_writer: Mutex<BufWriter<TcpStream>>,
    pub inner: Mutex<Inner>,
    pub cond: Condvar,
}

impl PeerShared {
    pub fn new(
        config: PeerConfig,
        game_host: String,
        game_port: u16,
        tracker_stream: TcpStream,
        metrics: MetricsRegistry,
    ) -> Result<Self, PeerError> {
        Ok(Self {
            peer_id: OnceLock::new(),
            game_host,
            game_port,
            config,
            metrics,
            tracker_writer: Mutex::new(BufWriter::new(tracker_stream)),
            inner: Mutex::new(Inner::new()),
            cond: Condvar::new(),
        })
    }

    pub fn peer_id(&self) -> PeerId {
        *self
            .peer_id
            .get()
            .expect("peer_id is set before any match/proposal traffic can arrive")
    }

    pub fn set_peer_id(&self, id: PeerId) {
        let _ = self.peer_id.set(id);
    }

    /// Sends a message to the tracker over the single persistent
    /// connection, serialized against concurrent senders (the match
    /// player and the init handshake both write to it).
    pub fn send_to_tracker(&self, msg: &TrackerMessage) -> Result<(), PeerError> {
        let mut writer = self.tracker_writer.lock().expect("tracker writer lock poisoned");
        chain::write_json_line(&mut *writer, msg).map_err(PeerError::from)
    }

    /// Clones the tracker socket for the dedicated listener thread to
    /// read from, wrapped in a buffered reader.
    pub fn tracker_reader(stream: &TcpStream) -> Result<BufReader<TcpStream>, PeerError> {
        Ok(BufReader::new(stream.try_clone()?))
    }

    /// Waits on the condition variable for up to `timeout` for `pending`
    /// to become non-empty (spec §4.2 proposal handler step 4).
    pub fn wait_for_pending<'a>(
        &self,
        mut guard: std::sync::MutexGuard<'a, Inner>,
        timeout: Duration,
    ) -> std::sync::MutexGuard<'a, Inner> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if !guard.pending.is_empty() {
                return guard;
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return guard;
            }
            let (new_guard, result) = self
                .cond
                .wait_timeout(guard, remaining)
                .expect("condvar wait lock poisoned");
            guard = new_guard;
            if result.timed_out() || !guard.pending.is_empty() {
                return guard;
            }
        }
    }
}
