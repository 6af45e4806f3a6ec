//! The peer-registry TCP acceptor (spec §4.3 "Registration" and
//! "Failure"): one thread accepts connections, one handler thread per
//! connected peer reads its `init` handshake and then its ongoing
//! `game_end`/`blockchain_update` traffic until it disconnects.
//!
//! Grounded on the same thread-per-accepted-connection shape as
//! `peer::peer_server`, which itself follows the pack's stratum-server
//! acceptor.

use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::thread;

use chain::{TrackerMessage, read_json_line, wire};

use crate::state::SharedState;

/// Runs the peer-registry accept loop until the listener errors out.
pub fn run_acceptor(state: SharedState, listener: TcpListener) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                tracing::info!(%addr, "peer connecting");
                let state = state.clone();
                thread::spawn(move || handle_peer(state, stream, addr.to_string()));
            }
            Err(e) => tracing::warn!("registry accept error: {e}"),
        }
    }
}

fn handle_peer(state: SharedState, stream: TcpStream, address: String) {
    let mut reader = match stream.try_clone() {
        Ok(s) => BufReader::new(s),
        Err(e) => {
            tracing::warn!("failed to clone peer stream: {e}");
            return;
        }
    };

    let game_port = match read_json_line::<_, TrackerMessage>(&mut reader) {
        Ok(Some(TrackerMessage::Init { game_port })) => game_port,
        Ok(Some(_other)) => {
            tracing::warn!(%address, "expected init as the first message, dropping peer");
            return;
        }
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(%address, "malformed init message: {e}");
            return;
        }
    };

    let peer_id = {
        let mut guard = state.lock().expect("tracker state lock poisoned");
        let (peer_id, record) = guard.register(address.clone(), game_port, stream);
        let _ = record.send(&TrackerMessage::PeerId { peer_id });
        peer_id
    };
    tracing::info!(peer_id, %address, game_port, "peer registered");
    broadcast_directory(&state);

    loop {
        match read_json_line::<_, TrackerMessage>(&mut reader) {
            Ok(Some(TrackerMessage::GameEnd {
                peer_id: reporter,
                match_id,
                opponent_id,
                match_log,
            })) => {
                tracing::info!(peer_id = reporter, %match_id, opponent_id, "game ended");
                let mut guard = state.lock().expect("tracker state lock poisoned");
                guard.return_to_idle(reporter);
                guard.push_log(match_log);
            }
            Ok(Some(TrackerMessage::BlockchainUpdate {
                peer_id: reporter,
                local_blockchain,
            })) => {
                let mut guard = state.lock().expect("tracker state lock poisoned");
                guard.record_chain(reporter, local_blockchain);
            }
            Ok(Some(_other)) => {
                tracing::debug!(peer_id, "ignoring tracker-originated message type from peer");
            }
            Ok(None) => {
                tracing::info!(peer_id, "peer disconnected");
                break;
            }
            Err(e) => {
                tracing::warn!(peer_id, "peer connection error: {e}");
                break;
            }
        }
    }

    {
        let mut guard = state.lock().expect("tracker state lock poisoned");
        guard.remove(peer_id);
    }
    broadcast_directory(&state);
}

/// Publishes the current peer directory to every registered peer (spec
/// §4.3: on registration and on failure).
pub fn broadcast_directory(state: &SharedState) {
    let (records, directory) = {
        let guard = state.lock().expect("tracker state lock poisoned");
        let records: Vec<_> = guard.registry.values().cloned().collect();
        (records, guard.directory())
    };
    let msg = TrackerMessage::NetworkUpdate {
        peers: wire::directory_to_wire(&directory),
    };
    for record in records {
        let _ = record.send(&msg);
    }
}
