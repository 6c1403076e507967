//! Client library for connecting to a ledgerkv server
//!
//! One request and one response per call, over a persistent connection.

use crate::error::{LedgerError, Result};
use crate::protocol::{Request, Response};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Client for a ledgerkv server
pub struct Client {
    stream: TcpStream,
}

impl Client {
    /// Connect to a ledgerkv server.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self { stream })
    }

    async fn send_request(&mut self, request: Request) -> Result<Response> {
        request.write(&mut self.stream).await?;
        match Response::read(&mut self.stream).await? {
            Some(response) => Ok(response),
            None => Err(LedgerError::Client(
                "server closed the connection".to_string(),
            )),
        }
    }

    /// Append a value to a key's list; returns whether the key existed
    /// before the append.
    pub async fn append(&mut self, key: &str, value: &str) -> Result<bool> {
        let request = Request::Append {
            key: key.to_string(),
            value: value.to_string(),
        };
        match self.send_request(request).await? {
            Response::AppendExisted => Ok(true),
            Response::AppendCreated => Ok(false),
            other => Err(LedgerError::Client(format!(
                "unexpected response to append: {:?}",
                other
            ))),
        }
    }

    /// Read a key's values; empty means the key is absent.
    pub async fn read(&mut self, key: &str) -> Result<Vec<String>> {
        let request = Request::Read {
            key: key.to_string(),
        };
        match self.send_request(request).await? {
            Response::ReadResult { values, .. } => Ok(values),
            other => Err(LedgerError::Client(format!(
                "unexpected response to read: {:?}",
                other
            ))),
        }
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
