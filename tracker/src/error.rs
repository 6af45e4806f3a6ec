//! Top-level error type for the tracker binary, mirroring `peer::error`.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum TrackerError {
    Io(io::Error),
    Protocol(String),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Io(e) => write!(f, "I/O error: {e}"),
            TrackerError::Protocol(msg) => write!(f, "protocol violation: {msg}"),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<io::Error> for TrackerError {
    fn from(e: io::Error) -> Self {
        TrackerError::Io(e)
    }
}
