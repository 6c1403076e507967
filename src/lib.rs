//! ledgerkv - a TCP key/value store where each key holds an ordered,
//! append-only list of string values
//!
//! - Length-prefixed binary wire protocol with stream resynchronization
//! - Task-per-connection server over a single shared store lock
//! - Operator console on stdin multiplexed with the listening socket
//! - JSON snapshot persistence (explicit `store` command or autosave)

pub mod client;
pub mod console;
pub mod error;
pub mod persist;
pub mod protocol;
pub mod server;
pub mod store;

pub use client::Client;
pub use error::{LedgerError, Result};
pub use protocol::{Request, Response};
pub use server::{LedgerServer, ServerConfig};
pub use store::ListStore;
