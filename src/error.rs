//! Error types for ledgerkv

use std::io;
use thiserror::Error;

/// Result type alias for ledgerkv operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Custom error types for ledgerkv
///
/// A clean end-of-stream is not an error: the protocol readers return
/// `Ok(None)` for it. `Protocol` covers everything a misbehaving peer can
/// send (unknown action byte, out-of-bounds length, invalid UTF-8, stream
/// closed mid-message) and is fatal to that one connection only.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid command: {0}")]
    Command(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),
}
