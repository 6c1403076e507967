//! ledgerkv server binary
//!
//! Usage: server [bind_addr] [snapshot_path] [--autosave]

use ledgerkv::{LedgerServer, Result, ServerConfig};
use std::env;
use std::sync::Arc;
use tokio::signal;

fn config_from_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let mut positional = Vec::new();
    for arg in env::args().skip(1) {
        if arg == "--autosave" {
            config.autosave = true;
        } else {
            positional.push(arg);
        }
    }
    if let Some(addr) = positional.first() {
        config.bind_addr = addr.clone();
    }
    if let Some(path) = positional.get(1) {
        config.store_path = path.clone();
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config_from_args();

    let server = Arc::new(LedgerServer::new(config).await?);

    // Ctrl-C triggers the same drain-and-stop path as the `exit` command.
    let server_clone = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            eprintln!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        if let Err(e) = server_clone.shutdown() {
            eprintln!("Failed to initiate shutdown: {}", e);
        }
    });

    server.run().await?;

    Ok(())
}
