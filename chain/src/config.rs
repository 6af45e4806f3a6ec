//! Top-level configuration for the chain library.
//!
//! The only thing here that varies is the metrics exporter's enable flag
//! and listen address; the PoW difficulty prefix is a fixed constant
//! (`types::block::POW_PREFIX`), not a config knob — nothing in `peer` or
//! `tracker` constructs a different difficulty, and spec.md's Non-goals
//! exclude variable difficulty outright.

use std::net::SocketAddr;

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration shared by peer and tracker nodes.
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    pub metrics: MetricsConfig,
}
