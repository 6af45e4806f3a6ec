//! Peer node entry point (spec §4.2): registers with the tracker, then
//! runs the tracker-listener, peer-server acceptor, and metrics exporter
//! on their own threads until the tracker connection drops.
//!
//! Grounded on the teacher's `api-gateway/src/main.rs`: `tracing_subscriber`
//! initialized from `RUST_LOG` with a hardcoded fallback filter, a
//! top-level `Result` bubbled to `eprintln!` + `process::exit(1)`.

mod config;
mod error;
mod match_player;
mod peer_server;
mod shared;

use std::net::{TcpListener, TcpStream};
use std::process;
use std::sync::Arc;
use std::thread;

use chain::{MetricsRegistry, TrackerMessage, read_json_line, wire};

use config::PeerConfig;
use error::PeerError;
use match_player::play_match;
use peer_server::run_peer_server;
use shared::PeerShared;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("peer=info,chain=info")),
        )
        .init();

    if let Err(e) = run() {
        tracing::error!("peer exiting: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), PeerError> {
    let config = PeerConfig::default();

    let peer_listener = TcpListener::bind((config.bind_host.as_str(), 0))?;
    let game_port = peer_listener.local_addr()?.port();
    tracing::info!(port = game_port, "peer-server listening");

    let tracker_stream = TcpStream::connect((config.tracker_host.as_str(), config.tracker_port))?;
    tracker_stream.set_nodelay(true).ok();

    let metrics = MetricsRegistry::new()
        .map_err(|e| PeerError::Protocol(format!("failed to build metrics registry: {e}")))?;

    let shared = Arc::new(PeerShared::new(
        config.clone(),
        config.bind_host.clone(),
        game_port,
        tracker_stream.try_clone()?,
        metrics.clone(),
    )?);

    shared.send_to_tracker(&TrackerMessage::Init { game_port })?;

    spawn_metrics_exporter(Arc::new(metrics));

    {
        let shared = shared.clone();
        thread::spawn(move || run_peer_server(shared, peer_listener));
    }

    listen_for_tracker(&shared, tracker_stream)
}

/// Runs a dedicated single-thread Tokio runtime just to drive the
/// Prometheus HTTP exporter future, so the rest of the peer stays on
/// plain OS threads per spec §5.
fn spawn_metrics_exporter(metrics: Arc<MetricsRegistry>) {
    let addr = chain::MetricsConfig::default().listen_addr;
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!("failed to start metrics runtime: {e}");
                return;
            }
        };
        if let Err(e) = runtime.block_on(chain::run_prometheus_http_server(metrics, addr)) {
            tracing::warn!("metrics exporter stopped: {e}");
        }
    });
}

/// Reads `TrackerMessage`s off the single persistent tracker connection
/// until EOF or a protocol error, treating either as fatal (spec §7).
fn listen_for_tracker(shared: &Arc<PeerShared>, stream: TcpStream) -> Result<(), PeerError> {
    let mut reader = PeerShared::tracker_reader(&stream)?;
    loop {
        match read_json_line::<_, TrackerMessage>(&mut reader) {
            Ok(Some(msg)) => handle_tracker_message(shared, msg),
            Ok(None) => {
                return Err(PeerError::Tracker(
                    "tracker closed the connection".to_string(),
                ));
            }
            Err(e) => return Err(PeerError::Tracker(format!("malformed message: {e}"))),
        }
    }
}

fn handle_tracker_message(shared: &Arc<PeerShared>, msg: TrackerMessage) {
    match msg {
        TrackerMessage::PeerId { peer_id } => {
            shared.set_peer_id(peer_id);
            tracing::info!(peer_id, "assigned peer id");
        }
        TrackerMessage::NetworkUpdate { peers } => {
            let directory = wire::directory_from_wire(peers);
            let mut inner = shared.inner.lock().expect("lock poisoned");
            inner.directory = directory;
        }
        TrackerMessage::MatchStart {
            match_id,
            opponent_id,
            opponent_addr,
            opponent_game_port,
        } => {
            tracing::info!(match_id = %match_id, opponent_id, "match starting");
            let shared = shared.clone();
            thread::spawn(move || {
                play_match(
                    &shared,
                    match_id,
                    opponent_id,
                    opponent_addr,
                    opponent_game_port,
                )
            });
        }
        TrackerMessage::Init { .. }
        | TrackerMessage::GameEnd { .. }
        | TrackerMessage::BlockchainUpdate { .. } => {
            tracing::debug!("ignoring peer-originated message type received from tracker");
        }
    }
}
