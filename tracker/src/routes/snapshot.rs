//! Read-only snapshot API (spec §6: "only the snapshot interface is
//! specified"): match logs and per-peer chain snapshots, grounded on the
//! teacher's `routes::models` handler shape (`State` extractor, a small
//! response DTO, a plain `StatusCode` success path since there is nothing
//! to validate on a read).

use std::collections::BTreeMap;

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use chain::{Block, PeerId};

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<String>,
}

/// `GET /logs`: the ordered match-completion log strings reported by
/// peers via `game_end`.
pub async fn logs(State(state): State<SharedState>) -> (StatusCode, Json<LogsResponse>) {
    let logs = state
        .lock()
        .expect("tracker state lock poisoned")
        .match_logs
        .clone();
    (StatusCode::OK, Json(LogsResponse { logs }))
}

#[derive(Debug, Serialize)]
pub struct ChainsResponse {
    pub chains: BTreeMap<PeerId, Vec<Block>>,
}

/// `GET /chains`: the most recent chain snapshot each peer reported via
/// `blockchain_update`.
pub async fn chains(State(state): State<SharedState>) -> (StatusCode, Json<ChainsResponse>) {
    let chains = state
        .lock()
        .expect("tracker state lock poisoned")
        .per_peer_chains
        .clone();
    (StatusCode::OK, Json(ChainsResponse { chains }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::state::TrackerState;

    #[tokio::test]
    async fn logs_returns_accumulated_match_logs() {
        let mut state = TrackerState::new();
        state.push_log("peer 1 beat peer 2".to_string());
        let shared: SharedState = Arc::new(Mutex::new(state));

        let (status, Json(body)) = logs(State(shared)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.logs, vec!["peer 1 beat peer 2".to_string()]);
    }

    #[tokio::test]
    async fn chains_returns_the_latest_snapshot_per_peer() {
        let mut state = TrackerState::new();
        state.record_chain(1, vec![Block::genesis()]);
        let shared: SharedState = Arc::new(Mutex::new(state));

        let (status, Json(body)) = chains(State(shared)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.chains.len(), 1);
        assert!(body.chains.contains_key(&1));
    }
}
