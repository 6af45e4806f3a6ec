//! Tracker/matchmaker binary.
//!
//! This binary runs three concerns side by side (spec §4.3, §5):
//!
//! - a blocking TCP acceptor for peer registration and ongoing
//!   `game_end`/`blockchain_update` traffic,
//! - a matchmaking loop pairing idle peers on a fixed interval,
//! - a read-only `axum` HTTP API (`GET /health`, `GET /logs`,
//!   `GET /chains`) for external readers.

mod acceptor;
mod config;
mod error;
mod matchmaker;
mod routes;
mod state;

use std::net::TcpListener;
use std::process;
use std::sync::{Arc, Mutex};
use std::thread;

use axum::{Router, routing::get};
use tokio::signal;

use acceptor::run_acceptor;
use config::TrackerConfig;
use error::TrackerError;
use matchmaker::run_matchmaker;
use routes::{health, snapshot};
use state::TrackerState;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tracker=info,chain=info")),
        )
        .init();

    if let Err(e) = run() {
        tracing::error!("tracker exiting: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), TrackerError> {
    let config = TrackerConfig::default();
    let state: state::SharedState = Arc::new(Mutex::new(TrackerState::new()));

    let listener = TcpListener::bind(("0.0.0.0", config.peer_port))?;
    tracing::info!(port = config.peer_port, "tracker peer registry listening");

    {
        let state = state.clone();
        thread::spawn(move || run_acceptor(state, listener));
    }
    {
        let state = state.clone();
        let interval = config.matchmaking_interval;
        thread::spawn(move || run_matchmaker(state, interval));
    }

    run_snapshot_api(state, config.snapshot_listen_addr)
}

/// Runs the read-only HTTP snapshot API on a dedicated Tokio runtime, so
/// the rest of the tracker stays on plain OS threads per spec §5.
fn run_snapshot_api(
    state: state::SharedState,
    addr: std::net::SocketAddr,
) -> Result<(), TrackerError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| TrackerError::Protocol(format!("failed to start HTTP runtime: {e}")))?;

    runtime.block_on(async move {
        let app = Router::new()
            .route("/health", get(health::health))
            .route("/logs", get(snapshot::logs))
            .route("/chains", get(snapshot::chains))
            .with_state(state);

        tracing::info!("snapshot API listening on http://{addr}");
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TrackerError::Protocol(format!("failed to bind {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| TrackerError::Protocol(format!("snapshot API server error: {e}")))
    })
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
