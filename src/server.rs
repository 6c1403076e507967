//! ledgerkv TCP server
//!
//! One task per accepted connection, a shared [`ListStore`] behind its lock,
//! and an operator console on stdin multiplexed with the listener in a
//! single `select!` loop. Shutdown stops accepting and then waits for every
//! open connection to drain.

use crate::{
    console::{self, ParsedCommand},
    error::{LedgerError, Result},
    protocol::{Request, Response},
    store::ListStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::broadcast,
    task::JoinSet,
};

/// ledgerkv server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Snapshot file loaded at startup and targeted by `load`/`store`.
    pub store_path: String,
    /// Persist a snapshot after every mutation instead of only on `store`.
    pub autosave: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7600".to_string(),
            store_path: "ledger.json".to_string(),
            autosave: false,
        }
    }
}

/// ledgerkv TCP server
pub struct LedgerServer {
    config: ServerConfig,
    store: Arc<ListStore>,
    shutdown_tx: broadcast::Sender<()>,
}

impl LedgerServer {
    /// Create a server, loading the snapshot file (empty store if absent).
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let store = ListStore::from_snapshot(&config.store_path)?;
        println!(
            "Loaded {} key(s) from {}",
            store.len().await,
            config.store_path
        );

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            store: Arc::new(store),
            shutdown_tx,
        })
    }

    /// Run the accept/console loop until `exit` or a shutdown signal, with
    /// the operator console on stdin.
    pub async fn run(&self) -> Result<()> {
        self.run_with_console(BufReader::new(tokio::io::stdin()))
            .await
    }

    /// Same as [`run`](Self::run) with an explicit console source.
    pub async fn run_with_console<C>(&self, console: C) -> Result<()>
    where
        C: AsyncBufRead + Unpin,
    {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        println!("ledgerkv server listening on {}", listener.local_addr()?);
        console::admin_help();

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut connections: JoinSet<()> = JoinSet::new();
        let mut console_lines = console.lines();
        let autosave_path = self
            .config
            .autosave
            .then(|| self.config.store_path.clone());

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let store = Arc::clone(&self.store);
                            let autosave_path = autosave_path.clone();
                            connections.spawn(async move {
                                eprintln!("Client connected: {}", addr);
                                if let Err(e) =
                                    handle_client(stream, addr, store, autosave_path).await
                                {
                                    eprintln!("Client {} error: {}", addr, e);
                                }
                                eprintln!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            eprintln!("Failed to accept connection: {}", e);
                        }
                    }
                }

                line = console_lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            match self.run_admin_line(&line).await {
                                Ok(true) => break,
                                Ok(false) => {}
                                Err(e) => println!("=> Error: {}", e),
                            }
                        }
                        Ok(None) => {
                            // Console closed (e.g. detached stdin).
                            eprintln!("Console closed, shutting down...");
                            break;
                        }
                        Err(e) => {
                            eprintln!("Failed to read console: {}", e);
                            break;
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    println!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        // Stop accepting before draining in-flight connections.
        drop(listener);
        if !connections.is_empty() {
            eprintln!("Waiting for {} open connection(s)...", connections.len());
        }
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                eprintln!("Connection task failed: {}", e);
            }
        }

        println!("Server stopped");
        Ok(())
    }

    /// Execute one operator-console line; returns whether to shut down.
    async fn run_admin_line(&self, line: &str) -> Result<bool> {
        let parsed = match console::parse_admin(line)? {
            Some(parsed) => parsed,
            None => return Ok(false),
        };
        self.run_admin_command(parsed).await
    }

    async fn run_admin_command(&self, parsed: ParsedCommand) -> Result<bool> {
        match parsed.name.as_str() {
            "append" => {
                let mut args = parsed.args.into_iter();
                let (key, value) = (args.next().unwrap(), args.next().unwrap());
                let existed_before = self.store.append(key, value).await;
                if existed_before {
                    println!("=> Existed before!");
                } else {
                    println!("=> Just created!");
                }
                self.autosave().await;
            }
            "read" => {
                let values = self.store.read(&parsed.args[0]).await;
                println!("=> Read values (len: {}): {:?}", values.len(), values);
            }
            "remove" => {
                let values = self.store.remove(&parsed.args[0]).await;
                println!("=> Removed values (len: {}): {:?}", values.len(), values);
                self.autosave().await;
            }
            "load" => {
                self.store.load(&self.config.store_path).await?;
                println!("=> Loaded ok");
            }
            "store" => {
                self.store.store(&self.config.store_path).await?;
                println!("=> Stored ok");
            }
            "help" => console::admin_help(),
            "exit" => return Ok(true),
            other => {
                // parse_admin only yields known names
                return Err(LedgerError::Command(format!(
                    "unhandled command: '{}'",
                    other
                )));
            }
        }
        Ok(false)
    }

    /// Persist after a console mutation when autosave is on; failures are
    /// reported to the operator, not fatal.
    async fn autosave(&self) {
        if self.config.autosave {
            if let Err(e) = self.store.store(&self.config.store_path).await {
                println!("=> Autosave failed: {}", e);
            }
        }
    }

    /// Trigger shutdown from outside the run loop (e.g. Ctrl-C).
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .map_err(|_| LedgerError::Server("failed to send shutdown signal".to_string()))?;
        Ok(())
    }
}

/// Serve one client connection until clean disconnect or protocol error.
///
/// The store lock is held only inside the store calls, never across socket
/// I/O. Any error here ends this connection without touching the others.
async fn handle_client(
    mut stream: TcpStream,
    addr: SocketAddr,
    store: Arc<ListStore>,
    autosave_path: Option<String>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.split();

    loop {
        let request = match Request::read(&mut reader).await? {
            Some(request) => request,
            // Clean end-of-stream: the client hung up between messages.
            None => break,
        };

        match request {
            Request::Read { key } => {
                let values = store.read(&key).await;
                Response::ReadResult { key, values }.write(&mut writer).await?;
            }
            Request::Append { key, value } => {
                let existed_before = store.append(key, value).await;
                let response = if existed_before {
                    Response::AppendExisted
                } else {
                    Response::AppendCreated
                };
                response.write(&mut writer).await?;
                if let Some(path) = &autosave_path {
                    if let Err(e) = store.store(path).await {
                        eprintln!("Autosave for client {} failed: {}", addr, e);
                    }
                }
            }
        }
    }

    Ok(())
}
