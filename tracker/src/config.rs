//! Tracker configuration, grounded on the teacher's `ApiConfig` (a fixed,
//! parsed listen-address literal) but extended with the matchmaking
//! interval and the peer-registry TCP port spec.md §6 names.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the tracker/matchmaker node.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// TCP port the peer-registry acceptor binds to (spec §6: historically
    /// 9000 or 10000).
    pub peer_port: u16,
    /// How often the matchmaking loop wakes up to pair idle peers.
    pub matchmaking_interval: Duration,
    /// Address the read-only HTTP snapshot API binds to.
    pub snapshot_listen_addr: SocketAddr,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            peer_port: env_parsed_or("TRACKER_PEER_PORT", 9000),
            matchmaking_interval: Duration::from_secs(env_parsed_or(
                "TRACKER_MATCHMAKING_INTERVAL_SECS",
                10,
            )),
            snapshot_listen_addr: env_or("TRACKER_SNAPSHOT_ADDR", "0.0.0.0:8081")
                .parse()
                .expect("TRACKER_SNAPSHOT_ADDR must be a valid socket address"),
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
