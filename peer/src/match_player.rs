//! The match player: runs one commit-reveal rock-paper-scissors match to
//! completion (spec §4.2 "Match protocol").
//!
//! Spawned on its own thread per `match_start`. Polls the shared buffer
//! for the opponent's commit/reveal (busy-wait, 50 ms by default) rather
//! than blocking on a socket read, since the opponent's messages arrive
//! on a different connection handled by the peer-server acceptor.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use chain::block::mine;
use chain::{Block, Move, PeerId, PeerMessage, Transaction, TrackerMessage, send_once};

use crate::shared::{MatchContext, PeerShared};

/// Runs the full match protocol for `match_id` against `opponent_id`,
/// blocking the calling thread until the match is fully settled.
pub fn play_match(
    shared: &PeerShared,
    match_id: String,
    opponent_id: PeerId,
    opponent_addr: String,
    opponent_game_port: u16,
) {
    let self_id = shared.peer_id();

    {
        let mut inner = shared.inner.lock().expect("lock poisoned");
        inner.current_match = Some(MatchContext {
            match_id: match_id.clone(),
            opponent_id,
        });
        inner.should_broadcast = true;
    }

    // Step 1-2: choose a move, commit to it, and announce the commitment.
    let my_move = random_move();
    let my_key = random_key();
    let my_hash = commit_hash(my_move, &my_key);

    {
        let mut inner = shared.inner.lock().expect("lock poisoned");
        inner.push_tx(Transaction::Commit {
            match_id: match_id.clone(),
            peer: self_id,
            hash: my_hash.clone(),
        });
    }
    let _ = send_once(
        (opponent_addr.as_str(), opponent_game_port),
        &PeerMessage::Commit {
            match_id: match_id.clone(),
            peer: self_id,
            hash: my_hash,
        },
    );

    // Step 3: busy-wait for the opponent's commit.
    wait_until(&shared.config.commit_reveal_poll, || {
        shared
            .inner
            .lock()
            .expect("lock poisoned")
            .has_commit_from(&match_id, opponent_id)
    });

    // Step 4: reveal.
    {
        let mut inner = shared.inner.lock().expect("lock poisoned");
        inner.push_tx(Transaction::Reveal {
            match_id: match_id.clone(),
            peer: self_id,
            mv: my_move,
            key: my_key.clone(),
        });
    }
    let _ = send_once(
        (opponent_addr.as_str(), opponent_game_port),
        &PeerMessage::Reveal {
            match_id: match_id.clone(),
            peer: self_id,
            mv: my_move,
            key: my_key,
        },
    );

    // Step 5: busy-wait for the opponent's reveal.
    wait_until(&shared.config.commit_reveal_poll, || {
        shared
            .inner
            .lock()
            .expect("lock poisoned")
            .reveal_from(&match_id, opponent_id)
            .is_some()
    });
    let opponent_move = shared
        .inner
        .lock()
        .expect("lock poisoned")
        .reveal_from(&match_id, opponent_id)
        .expect("wait_until guaranteed a reveal is present");

    // Step 6: compute and record the result locally. Never sent as a
    // standalone message; it is disseminated only via the mined block.
    let (winner, tie) = recompute_result(self_id, my_move, opponent_id, opponent_move);
    {
        let mut inner = shared.inner.lock().expect("lock poisoned");
        inner.push_tx(Transaction::Result {
            match_id: match_id.clone(),
            winner,
            tie,
        });
    }
    shared.metrics.chain.matches_completed_total.inc();

    // Step 7-8: mining election. Lower peer ID mines.
    if self_id < opponent_id {
        mine_and_broadcast(shared);
    }

    // Step 9: regardless of election, report up to the tracker and reset.
    // A racing inbound `BlockProposal` settling this same match may have
    // already cleared `current_match` and sent `game_end` from the
    // proposal handler (spec §4.2 step 3); only send it here if that
    // hasn't happened, so the tracker sees exactly one `game_end` per
    // match.
    let outcome_desc = describe_outcome(self_id, opponent_id, winner, tie);
    let local_blockchain = shared
        .inner
        .lock()
        .expect("lock poisoned")
        .chain
        .blocks()
        .to_vec();
    let _ = shared.send_to_tracker(&TrackerMessage::BlockchainUpdate {
        peer_id: self_id,
        local_blockchain,
    });

    let mut inner = shared.inner.lock().expect("lock poisoned");
    let still_ours = inner
        .current_match
        .as_ref()
        .is_some_and(|m| m.match_id == match_id);
    if still_ours {
        inner.current_match = None;
    }
    inner.buffer.clear();
    drop(inner);

    if still_ours {
        end_game(shared, &match_id, opponent_id, outcome_desc);
    }
}

/// Mines a candidate block containing the current buffer and either
/// broadcasts it or stashes it in `pending` if a proposal preempted us
/// (spec §4.2 step 8).
fn mine_and_broadcast(shared: &PeerShared) {
    let (index, prev, transactions) = {
        let inner = shared.inner.lock().expect("lock poisoned");
        (
            inner.chain.height() + 1,
            inner.chain.tip().hash(),
            inner.buffer.clone(),
        )
    };
    let timestamp = current_unix_timestamp();

    // Mining is CPU-bound and never runs while holding the lock; it gets
    // its own thread so the rest of the peer's I/O keeps flowing.
    let mined = thread::spawn(move || {
        let mut block = Block::new(index, prev, timestamp, transactions);
        let start = std::time::Instant::now();
        mine(&mut block);
        (block, start.elapsed())
    })
    .join()
    .expect("mining thread panicked");
    let (block, elapsed) = mined;
    shared
        .metrics
        .chain
        .mine_duration_seconds
        .observe(elapsed.as_secs_f64());

    let mut inner = shared.inner.lock().expect("lock poisoned");
    if inner.should_broadcast {
        let directory = inner.directory.clone();
        let outcome = inner.chain.add(block.clone());
        record_add_outcome(shared, outcome);
        inner.clean_buffer(&block.transactions);
        drop(inner);
        broadcast_block(shared, &directory, &block);
    } else {
        inner.pending.push(block);
        shared.cond.notify_all();
    }
}

/// Broadcasts `block` to every peer in `directory` other than ourselves.
pub fn broadcast_block(shared: &PeerShared, directory: &std::collections::BTreeMap<PeerId, chain::PeerInfo>, block: &Block) {
    let self_id = shared.peer_id();
    let msg = PeerMessage::BlockProposal {
        peer: self_id,
        block: block.clone(),
    };
    for (&id, info) in directory {
        if id == self_id {
            continue;
        }
        let _ = send_once((info.address.as_str(), info.port), &msg);
    }
}

pub fn record_add_outcome(shared: &PeerShared, outcome: chain::AddOutcome) {
    match outcome {
        chain::AddOutcome::Appended => shared.metrics.chain.blocks_appended_total.inc(),
        chain::AddOutcome::Reorganized => shared.metrics.chain.blocks_reorganized_total.inc(),
        chain::AddOutcome::Rejected => shared.metrics.chain.blocks_rejected_total.inc(),
    }
}

fn end_game(shared: &PeerShared, match_id: &str, opponent_id: PeerId, match_log: String) {
    let _ = shared.send_to_tracker(&TrackerMessage::GameEnd {
        peer_id: shared.peer_id(),
        opponent_id,
        match_id: match_id.to_string(),
        match_log,
    });
}

fn describe_outcome(self_id: PeerId, opponent_id: PeerId, winner: PeerId, tie: bool) -> String {
    let verdict = if tie {
        "tied".to_string()
    } else if winner == self_id {
        "won".to_string()
    } else {
        "lost".to_string()
    };
    format!(
        "peer {self_id} played peer {opponent_id} at {} and {verdict}",
        current_unix_timestamp()
    )
}

/// Recomputes the declared `(winner, tie)` pair the same way
/// `chain::validate` does: sort the two reveals by peer ID ascending and
/// apply the rock-paper-scissors table.
fn recompute_result(
    peer_a: PeerId,
    move_a: Move,
    peer_b: PeerId,
    move_b: Move,
) -> (PeerId, bool) {
    let (p1, m1, p2, m2) = if peer_a <= peer_b {
        (peer_a, move_a, peer_b, move_b)
    } else {
        (peer_b, move_b, peer_a, move_a)
    };
    match m1.beats(&m2) {
        None => (0, true),
        Some(true) => (p1, false),
        Some(false) => (p2, false),
    }
}

fn commit_hash(mv: Move, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mv.as_str().as_bytes());
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn random_move() -> Move {
    let idx = (OsRng.next_u32() as usize) % Move::ALL.len();
    Move::ALL[idx]
}

fn random_key() -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Busy-waits, sleeping `poll` between checks, until `predicate` holds.
fn wait_until<F: FnMut() -> bool>(poll: &Duration, mut predicate: F) {
    while !predicate() {
        thread::sleep(*poll);
    }
}
