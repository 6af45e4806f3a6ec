//! Chain library crate.
//!
//! This crate provides the shared building blocks for the rock-paper-
//! scissors proof-of-work ledger:
//!
//! - strongly-typed domain types (`types`): moves, transactions, blocks,
//!   and canonical hashing,
//! - the chain engine (`engine`): validation and the `add` protocol
//!   (linear extension / depth-1 fork / reject),
//! - the peer/tracker wire protocol (`wire`) and newline-JSON framing
//!   helpers (`net`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! The `peer` and `tracker` binaries compose these pieces; this crate
//! owns nothing that talks to a socket on its own behalf.

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod net;
pub mod types;
pub mod wire;

// Re-export top-level configuration types.
pub use config::{ChainConfig, MetricsConfig};

// Re-export the chain engine.
pub use engine::{AddOutcome, Chain, validate};

// Re-export error types.
pub use error::{ChainError, ValidationError};

// Re-export metrics registry and chain metrics.
pub use metrics::{ChainMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export the wire protocol and framing helpers.
pub use net::{read_json_line, send_once, write_json_line};
pub use wire::{PeerInfo, PeerMessage, TrackerMessage};

// Re-export domain types at the crate root for convenience.
pub use types::*;
