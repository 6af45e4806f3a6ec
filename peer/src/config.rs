//! Peer node configuration, read from environment variables with
//! hardcoded defaults — mirroring the env-var-driven `RUST_LOG` pattern
//! the teacher's binaries already use for `tracing_subscriber`.

use std::time::Duration;

/// Configuration for a peer node.
#[derive(Clone, Debug)]
pub struct PeerConfig {
    /// Tracker hostname or IP to connect to.
    pub tracker_host: String,
    /// Tracker TCP port.
    pub tracker_port: u16,
    /// Address the peer-server socket binds to. The OS assigns an
    /// ephemeral port, announced to the tracker via `init`.
    pub bind_host: String,
    /// Poll interval while waiting for the opponent's commit/reveal
    /// (spec §4.2, default 50 ms).
    pub commit_reveal_poll: Duration,
    /// Timeout for the proposal handler's wait on a racing local mine
    /// landing in `pending` (spec §4.2/§5, default 300 ms).
    pub pending_wait: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            tracker_host: env_or("PEER_TRACKER_HOST", "127.0.0.1"),
            tracker_port: env_parsed_or("PEER_TRACKER_PORT", 9000),
            bind_host: env_or("PEER_BIND_HOST", "127.0.0.1"),
            commit_reveal_poll: Duration::from_millis(env_parsed_or(
                "PEER_COMMIT_REVEAL_POLL_MS",
                50,
            )),
            pending_wait: Duration::from_millis(env_parsed_or("PEER_PENDING_WAIT_MS", 300)),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
