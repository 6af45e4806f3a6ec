//! The peer-server acceptor and its per-connection message handlers
//! (spec §4.2 "Proposal handler" and "Chain synchronization").
//!
//! One thread accepts inbound connections; each accepted connection gets
//! its own handler thread, grounded on the stratum-server's
//! thread-per-accepted-connection pattern. A connection carries exactly
//! one logical message per spec §4.2's newline-JSON framer, though
//! nothing stops a sender from reusing a connection for several lines —
//! the handler reads until EOF.

use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use chain::block::mine;
use chain::{Block, Chain, PeerId, PeerMessage, Transaction, TrackerMessage, read_json_line, send_once};

use crate::match_player::{broadcast_block, record_add_outcome};
use crate::shared::PeerShared;

/// Runs the peer-server accept loop until the listener errors out.
pub fn run_peer_server(shared: Arc<PeerShared>, listener: TcpListener) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                tracing::debug!(%addr, "accepted peer connection");
                let shared = shared.clone();
                thread::spawn(move || handle_peer_connection(&shared, stream));
            }
            Err(e) => {
                tracing::warn!("peer-server accept error: {e}");
            }
        }
    }
}

fn handle_peer_connection(shared: &PeerShared, stream: TcpStream) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_json_line::<_, PeerMessage>(&mut reader) {
            Ok(Some(msg)) => handle_peer_message(shared, msg),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("malformed peer message, closing connection: {e}");
                break;
            }
        }
    }
}

fn handle_peer_message(shared: &PeerShared, msg: PeerMessage) {
    match msg {
        PeerMessage::BlockProposal { peer, block } => handle_block_proposal(shared, peer, block),
        PeerMessage::ChainRequest {
            from_peer,
            reply_addr,
            reply_port,
        } => handle_chain_request(shared, from_peer, reply_addr, reply_port),
        PeerMessage::ChainResponse { chain, from_peer } => {
            handle_chain_response(shared, from_peer, chain)
        }
        other => {
            if let Some(tx) = other.into_transaction() {
                let mut inner = shared.inner.lock().expect("lock poisoned");
                inner.push_tx(tx);
            }
        }
    }
}

/// Spec §4.2 "Proposal handler": preempt any in-flight local mine, fold
/// the proposal into the chain, settle our own match if it just
/// completed, and give a racing local mine a short window to land in
/// `pending` before rebroadcasting it onto the new tip.
fn handle_block_proposal(shared: &PeerShared, sender: PeerId, block: Block) {
    let mut inner = shared.inner.lock().expect("lock poisoned");
    inner.should_broadcast = false;

    let outcome = inner.chain.add(block.clone());
    record_add_outcome(shared, outcome);
    inner.clean_buffer(&block.transactions);

    if let Err(e) = inner.chain.self_check() {
        tracing::warn!("chain self-check failed after proposal: {e}");
        if let Some(info) = inner.directory.get(&sender).cloned() {
            let reply_addr = shared.game_host.clone();
            let reply_port = shared.game_port;
            let request = PeerMessage::ChainRequest {
                from_peer: shared.peer_id(),
                reply_addr,
                reply_port,
            };
            drop(inner);
            let _ = send_once((info.address.as_str(), info.port), &request);
            inner = shared.inner.lock().expect("lock poisoned");
        }
    }

    let settles_current_match = inner
        .current_match
        .as_ref()
        .is_some_and(|m| block_carries_result_for(&block, &m.match_id));
    if settles_current_match {
        let ctx = inner.current_match.take().expect("checked above");
        drop(inner);
        let _ = shared.send_to_tracker(&TrackerMessage::GameEnd {
            peer_id: shared.peer_id(),
            opponent_id: ctx.opponent_id,
            match_id: ctx.match_id,
            match_log: "settled by an incoming block proposal".to_string(),
        });
        inner = shared.inner.lock().expect("lock poisoned");
    }

    let guard = shared.wait_for_pending(inner, shared.config.pending_wait);
    rescue_pending(shared, guard);
}

fn block_carries_result_for(block: &Block, match_id: &str) -> bool {
    block.transactions.iter().any(|tx| {
        matches!(tx, Transaction::Result { match_id: m, .. } if m == match_id)
    })
}

/// Pops a locally mined block that lost the broadcast race, re-mines it
/// on top of the (possibly now different) tip, and rebroadcasts it.
fn rescue_pending(shared: &PeerShared, mut guard: std::sync::MutexGuard<'_, crate::shared::Inner>) {
    let Some(mut stale) = guard.pending.pop() else {
        return;
    };
    let tip = guard.chain.tip().clone();
    let directory = guard.directory.clone();
    drop(guard);

    stale.header.index = tip.header.index + 1;
    stale.header.prev = tip.hash();
    stale.header.nonce = 0;
    let mut remined = Block::new(
        stale.header.index,
        stale.header.prev.clone(),
        stale.header.timestamp,
        stale.transactions.clone(),
    );
    mine(&mut remined);

    let mut guard = shared.inner.lock().expect("lock poisoned");
    let outcome = guard.chain.add(remined.clone());
    record_add_outcome(shared, outcome);
    guard.clean_buffer(&remined.transactions);
    drop(guard);

    broadcast_block(shared, &directory, &remined);
}

fn handle_chain_request(shared: &PeerShared, _from_peer: PeerId, reply_addr: String, reply_port: u16) {
    let blocks = shared
        .inner
        .lock()
        .expect("lock poisoned")
        .chain
        .blocks()
        .to_vec();
    let response = PeerMessage::ChainResponse {
        chain: blocks,
        from_peer: shared.peer_id(),
    };
    let _ = send_once((reply_addr.as_str(), reply_port), &response);
}

/// Adopts `blocks` wholesale iff they pass the chain engine's structural
/// self-check end-to-end — the canonical resolution of the open question
/// on `CHAIN_RESPONSE` adoption (spec §9.1).
fn handle_chain_response(shared: &PeerShared, _from_peer: PeerId, blocks: Vec<Block>) {
    let mut inner = shared.inner.lock().expect("lock poisoned");
    let mut candidate: Chain = inner.chain.clone();
    candidate.replace(blocks.clone());
    if candidate.self_check().is_err() {
        tracing::warn!("rejecting CHAIN_RESPONSE: candidate chain failed self-check");
        return;
    }
    inner.chain.replace(blocks.clone());
    let all_txs: Vec<Transaction> = blocks.into_iter().flat_map(|b| b.transactions).collect();
    inner.clean_buffer(&all_txs);
}

/// End-to-end test of spec.md §8 scenario S2: two real peer-server
/// sockets, two `PeerShared` instances, a real commit-reveal exchange
/// and mine/broadcast, no mocking of the wire.
#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use chain::{MetricsRegistry, Move, PeerInfo};
    use sha2::{Digest, Sha256};

    use crate::config::PeerConfig;
    use crate::match_player::play_match;

    fn commit_hash_for(mv: Move, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(mv.as_str().as_bytes());
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn mined_block(index: u64, prev: String, transactions: Vec<Transaction>) -> Block {
        let mut block = Block::new(index, prev, index, transactions);
        mine(&mut block);
        block
    }

    fn spawn_test_peer(peer_id: PeerId) -> (Arc<PeerShared>, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind peer-server socket");
        let port = listener.local_addr().expect("local_addr").port();

        // PeerShared requires a writable tracker socket; this test never
        // sends tracker traffic, so a throwaway loopback pair suffices.
        let tracker_listener = TcpListener::bind("127.0.0.1:0").expect("bind tracker stub");
        let tracker_addr = tracker_listener.local_addr().expect("local_addr");
        let tracker_client = TcpStream::connect(tracker_addr).expect("connect tracker stub");
        let _tracker_server = tracker_listener.accept().expect("accept tracker stub");

        let config = PeerConfig {
            commit_reveal_poll: Duration::from_millis(5),
            pending_wait: Duration::from_millis(50),
            ..PeerConfig::default()
        };
        let shared = Arc::new(
            PeerShared::new(
                config,
                "127.0.0.1".to_string(),
                port,
                tracker_client,
                MetricsRegistry::new().expect("metrics registry"),
            )
            .expect("construct PeerShared"),
        );
        shared.set_peer_id(peer_id);

        let server_shared = shared.clone();
        thread::spawn(move || run_peer_server(server_shared, listener));
        (shared, port)
    }

    #[test]
    fn two_peers_converge_on_a_single_match_block() {
        let (peer1, port1) = spawn_test_peer(1);
        let (peer2, port2) = spawn_test_peer(2);

        let mut directory = BTreeMap::new();
        directory.insert(
            1,
            PeerInfo {
                address: "127.0.0.1".to_string(),
                port: port1,
            },
        );
        directory.insert(
            2,
            PeerInfo {
                address: "127.0.0.1".to_string(),
                port: port2,
            },
        );
        peer1.inner.lock().unwrap().directory = directory.clone();
        peer2.inner.lock().unwrap().directory = directory;

        let p1 = peer1.clone();
        let t1 = thread::spawn(move || {
            play_match(&p1, "match_test".to_string(), 2, "127.0.0.1".to_string(), port2);
        });
        let p2 = peer2.clone();
        let t2 = thread::spawn(move || {
            play_match(&p2, "match_test".to_string(), 1, "127.0.0.1".to_string(), port1);
        });
        t1.join().expect("peer 1 thread panicked");
        t2.join().expect("peer 2 thread panicked");

        // Let any rescue/rebroadcast traffic triggered by the race settle.
        thread::sleep(Duration::from_millis(200));

        let height1 = peer1.inner.lock().unwrap().chain.height();
        let height2 = peer2.inner.lock().unwrap().chain.height();
        assert_eq!(height1, 1);
        assert_eq!(height2, 1);
        assert_eq!(
            peer1.inner.lock().unwrap().chain.tip().hash(),
            peer2.inner.lock().unwrap().chain.tip().hash()
        );
    }

    /// Spec §8 scenario S3: a locally mined block that loses the broadcast
    /// race lands in `pending` and is rescued — re-mined on top of the
    /// winning proposal and appended — all through the real
    /// `handle_block_proposal` path, not the chain engine directly.
    #[test]
    fn losing_local_mine_is_rescued_and_appended_after_a_winning_proposal() {
        let (observer, port) = spawn_test_peer(20);
        let genesis_hash = observer.inner.lock().unwrap().chain.genesis().hash();

        let winning = mined_block(1, genesis_hash.clone(), vec![]);
        let stale = mined_block(
            1,
            genesis_hash,
            vec![Transaction::Commit {
                match_id: "match_stale".to_string(),
                peer: 20,
                hash: "deadbeef".to_string(),
            }],
        );

        // Simulates this peer's own `mine_and_broadcast` finishing just
        // after the incoming proposal preempted it: the block lands in
        // `pending` instead of being broadcast directly.
        {
            let p = observer.clone();
            let stale = stale.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                let mut inner = p.inner.lock().unwrap();
                inner.pending.push(stale);
                p.cond.notify_all();
            });
        }

        send_once(
            ("127.0.0.1", port),
            &PeerMessage::BlockProposal {
                peer: 21,
                block: winning.clone(),
            },
        )
        .expect("send winning proposal");

        thread::sleep(Duration::from_millis(150));

        let inner = observer.inner.lock().unwrap();
        assert_eq!(inner.chain.height(), 2);
        assert_eq!(inner.chain.blocks()[1].hash(), winning.hash());
        assert_eq!(inner.chain.blocks()[2].header.prev, winning.hash());
        assert_ne!(inner.chain.blocks()[2].hash(), stale.hash());
    }

    /// Spec §8 scenario S4: a block proposing a reveal that does not match
    /// its own commit is rejected by `handle_block_proposal`, not merely
    /// by `chain::engine::validate` in isolation.
    #[test]
    fn block_proposal_with_a_bad_reveal_is_rejected() {
        let (observer, port) = spawn_test_peer(30);
        let genesis_hash = observer.inner.lock().unwrap().chain.genesis().hash();

        let bad_block = mined_block(
            1,
            genesis_hash,
            vec![
                Transaction::Commit {
                    match_id: "match_bad_reveal".to_string(),
                    peer: 1,
                    hash: commit_hash_for(Move::Rock, "k1"),
                },
                Transaction::Reveal {
                    match_id: "match_bad_reveal".to_string(),
                    peer: 1,
                    mv: Move::Paper,
                    key: "k1".to_string(),
                },
            ],
        );

        send_once(
            ("127.0.0.1", port),
            &PeerMessage::BlockProposal {
                peer: 31,
                block: bad_block,
            },
        )
        .expect("send bad-reveal proposal");

        thread::sleep(Duration::from_millis(100));

        assert_eq!(observer.inner.lock().unwrap().chain.height(), 0);
    }

    /// Spec §8 scenario S5: a block declaring the wrong winner for two
    /// truthful reveals is rejected by `handle_block_proposal`.
    #[test]
    fn block_proposal_with_the_wrong_declared_winner_is_rejected() {
        let (observer, port) = spawn_test_peer(40);
        let genesis_hash = observer.inner.lock().unwrap().chain.genesis().hash();

        let bad_block = mined_block(
            1,
            genesis_hash,
            vec![
                Transaction::Commit {
                    match_id: "match_bad_winner".to_string(),
                    peer: 1,
                    hash: commit_hash_for(Move::Rock, "k1"),
                },
                Transaction::Commit {
                    match_id: "match_bad_winner".to_string(),
                    peer: 2,
                    hash: commit_hash_for(Move::Scissors, "k2"),
                },
                Transaction::Reveal {
                    match_id: "match_bad_winner".to_string(),
                    peer: 1,
                    mv: Move::Rock,
                    key: "k1".to_string(),
                },
                Transaction::Reveal {
                    match_id: "match_bad_winner".to_string(),
                    peer: 2,
                    mv: Move::Scissors,
                    key: "k2".to_string(),
                },
                Transaction::Result {
                    match_id: "match_bad_winner".to_string(),
                    winner: 2,
                    tie: false,
                },
            ],
        );

        send_once(
            ("127.0.0.1", port),
            &PeerMessage::BlockProposal {
                peer: 41,
                block: bad_block,
            },
        )
        .expect("send bad-winner proposal");

        thread::sleep(Duration::from_millis(100));

        assert_eq!(observer.inner.lock().unwrap().chain.height(), 0);
    }
}
