//! Top-level error type for the peer binary.
//!
//! Grounded on the teacher's stringly-typed `run() -> Result<(), String>`
//! at the top of `main`, upgraded to a real enum — the one place the
//! ambient-stack rule calls for an improvement already visible elsewhere
//! in the pack (`StorageError`, `MlError`).

use std::fmt;
use std::io;

/// Errors that can terminate the peer process.
#[derive(Debug)]
pub enum PeerError {
    /// A socket operation failed.
    Io(io::Error),
    /// A peer or tracker message violated the wire protocol (spec §7
    /// "Protocol violation").
    Protocol(String),
    /// The tracker connection was lost or misbehaved (spec §7 "Fatal":
    /// peers treat tracker disconnect as fatal and exit).
    Tracker(String),
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::Io(e) => write!(f, "I/O error: {e}"),
            PeerError::Protocol(msg) => write!(f, "protocol violation: {msg}"),
            PeerError::Tracker(msg) => write!(f, "tracker error: {msg}"),
        }
    }
}

impl std::error::Error for PeerError {}

impl From<io::Error> for PeerError {
    fn from(e: io::Error) -> Self {
        PeerError::Io(e)
    }
}
