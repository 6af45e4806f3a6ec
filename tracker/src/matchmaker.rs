//! The matchmaking loop (spec §4.3 "Matchmaking loop"): wakes up on a
//! fixed interval, shuffles the idle pool, and pairs peers up, each
//! pairing announced by its own worker thread so a slow `send` to one
//! peer cannot stall the others.

use std::thread;
use std::time::Duration;

use chain::{PeerId, TrackerMessage};

use crate::state::SharedState;

/// Runs the matchmaking loop forever on the calling thread.
pub fn run_matchmaker(state: SharedState, interval: Duration) {
    loop {
        thread::sleep(interval);

        let pairs = {
            let mut guard = state.lock().expect("tracker state lock poisoned");
            let pairs = guard.drain_idle_pairs();
            pairs
                .into_iter()
                .map(|(a, b)| (a, b, guard.next_match_id()))
                .collect::<Vec<_>>()
        };

        for (peer_a, peer_b, match_id) in pairs {
            let state = state.clone();
            thread::spawn(move || announce_match(&state, peer_a, peer_b, match_id));
        }
    }
}

fn announce_match(state: &SharedState, peer_a: PeerId, peer_b: PeerId, match_id: String) {
    let (record_a, record_b) = {
        let guard = state.lock().expect("tracker state lock poisoned");
        let record_a = guard.registry.get(&peer_a).cloned();
        let record_b = guard.registry.get(&peer_b).cloned();
        (record_a, record_b)
    };
    let (Some(record_a), Some(record_b)) = (record_a, record_b) else {
        tracing::warn!(peer_a, peer_b, "matched peer vanished before announcement");
        return;
    };

    let to_a = TrackerMessage::MatchStart {
        match_id: match_id.clone(),
        opponent_id: peer_b,
        opponent_addr: record_b.address.clone(),
        opponent_game_port: record_b.game_port,
    };
    let to_b = TrackerMessage::MatchStart {
        match_id: match_id.clone(),
        opponent_id: peer_a,
        opponent_addr: record_a.address.clone(),
        opponent_game_port: record_a.game_port,
    };

    if let Err(e) = record_a.send(&to_a) {
        tracing::warn!(peer_a, "failed to announce match: {e}");
    }
    if let Err(e) = record_b.send(&to_b) {
        tracing::warn!(peer_b, "failed to announce match: {e}");
    }
    tracing::info!(%match_id, peer_a, peer_b, "match announced");
}
