//! Binary wire protocol for ledgerkv
//!
//! Every message starts with a 3-byte magic marker followed by an action
//! byte and a length-prefixed body. The reader scans for the magic one byte
//! at a time so it can resynchronize after garbage on the stream.

use crate::error::{LedgerError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Magic marker prefixed to every message.
///
/// The resync scanner below resets to the start of the marker on any
/// mismatching byte instead of checking for partial overlap. That is only
/// correct for markers with no internal repetition; keep that property if
/// this marker ever changes.
pub const MAGIC: &[u8; 3] = b"HDD";

const REQ_READ: u8 = 0x01;
const REQ_APPEND: u8 = 0x02;

const RESP_READ_RESULT: u8 = 0x01;
const RESP_APPEND_CREATED: u8 = 0x02;
const RESP_APPEND_EXISTED: u8 = 0x03;

/// Requests a client can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Read { key: String },
    Append { key: String, value: String },
}

/// Responses the server sends back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadResult { key: String, values: Vec<String> },
    AppendCreated,
    AppendExisted,
}

fn protocol_err(msg: impl Into<String>) -> LedgerError {
    LedgerError::Protocol(msg.into())
}

/// Read one byte, or `None` if the stream is at end-of-file.
async fn read_byte<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    let n = reader.read(&mut buf).await?;
    if n == 0 {
        Ok(None)
    } else {
        Ok(Some(buf[0]))
    }
}

/// Read one byte that must be present (we are mid-message).
async fn read_required_byte<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u8> {
    read_byte(reader)
        .await?
        .ok_or_else(|| protocol_err("stream closed mid-message"))
}

/// Scan the stream for the magic marker.
///
/// Returns `false` on end-of-stream, which the message readers report as a
/// clean "no more messages". A byte that breaks a partial match is consumed
/// and the scan restarts at the full marker.
async fn read_magic<R: AsyncRead + Unpin>(reader: &mut R) -> Result<bool> {
    let mut needed: usize = MAGIC.len();
    while needed > 0 {
        let byte = match read_byte(reader).await? {
            Some(b) => b,
            None => return Ok(false),
        };
        if byte == MAGIC[MAGIC.len() - needed] {
            needed -= 1;
        } else {
            needed = MAGIC.len();
        }
    }
    Ok(true)
}

/// Read a zero-based number: one byte holding 0..=255.
async fn read_zero_number<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize> {
    Ok(read_required_byte(reader).await? as usize)
}

/// Read a one-based number: one byte holding `value - 1`, so 1..=256.
async fn read_one_number<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize> {
    Ok(read_zero_number(reader).await? + 1)
}

/// Read a one-based length-prefixed UTF-8 string.
async fn read_string<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let len = read_one_number(reader).await?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            protocol_err("stream closed mid-string")
        } else {
            LedgerError::Io(e)
        }
    })?;
    String::from_utf8(buf).map_err(|e| protocol_err(format!("invalid UTF-8 in string: {}", e)))
}

fn push_zero_number(buf: &mut Vec<u8>, num: usize) -> Result<()> {
    if num > 0xFF {
        return Err(protocol_err(format!("number {} out of 0..=255 range", num)));
    }
    buf.push(num as u8);
    Ok(())
}

fn push_one_number(buf: &mut Vec<u8>, num: usize) -> Result<()> {
    if num < 1 || num > 0x100 {
        return Err(protocol_err(format!("number {} out of 1..=256 range", num)));
    }
    push_zero_number(buf, num - 1)
}

fn push_string(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = s.len();
    if len < 1 || len > 0x100 {
        return Err(protocol_err(format!(
            "string length {} out of 1..=256 range",
            len
        )));
    }
    push_one_number(buf, len)?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

impl Request {
    /// Decode the next request from the stream.
    ///
    /// `Ok(None)` means the peer closed the connection before the next
    /// message's magic completed; any later truncation is a protocol error.
    pub async fn read<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Request>> {
        if !read_magic(reader).await? {
            return Ok(None);
        }
        let action = read_required_byte(reader).await?;
        match action {
            REQ_READ => {
                let key = read_string(reader).await?;
                Ok(Some(Request::Read { key }))
            }
            REQ_APPEND => {
                let key = read_string(reader).await?;
                let value = read_string(reader).await?;
                Ok(Some(Request::Append { key, value }))
            }
            other => Err(protocol_err(format!(
                "unknown request action byte: {:#04x}",
                other
            ))),
        }
    }

    /// Serialize to the wire format, enforcing field bounds.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(MAGIC.len() + 8);
        buf.extend_from_slice(MAGIC);
        match self {
            Request::Read { key } => {
                buf.push(REQ_READ);
                push_string(&mut buf, key)?;
            }
            Request::Append { key, value } => {
                buf.push(REQ_APPEND);
                push_string(&mut buf, key)?;
                push_string(&mut buf, value)?;
            }
        }
        Ok(buf)
    }

    /// Encode and send on the stream.
    pub async fn write<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl Response {
    /// Decode the next response from the stream; `Ok(None)` on clean close.
    pub async fn read<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Response>> {
        if !read_magic(reader).await? {
            return Ok(None);
        }
        let action = read_required_byte(reader).await?;
        match action {
            RESP_READ_RESULT => {
                let key = read_string(reader).await?;
                let count = read_zero_number(reader).await?;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(read_string(reader).await?);
                }
                Ok(Some(Response::ReadResult { key, values }))
            }
            RESP_APPEND_CREATED => Ok(Some(Response::AppendCreated)),
            RESP_APPEND_EXISTED => Ok(Some(Response::AppendExisted)),
            other => Err(protocol_err(format!(
                "unknown response action byte: {:#04x}",
                other
            ))),
        }
    }

    /// Serialize to the wire format, enforcing field bounds.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(MAGIC.len() + 8);
        buf.extend_from_slice(MAGIC);
        match self {
            Response::ReadResult { key, values } => {
                buf.push(RESP_READ_RESULT);
                push_string(&mut buf, key)?;
                push_zero_number(&mut buf, values.len())?;
                for value in values {
                    push_string(&mut buf, value)?;
                }
            }
            Response::AppendCreated => buf.push(RESP_APPEND_CREATED),
            Response::AppendExisted => buf.push(RESP_APPEND_EXISTED),
        }
        Ok(buf)
    }

    /// Encode and send on the stream.
    pub async fn write<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn decode_request(bytes: &[u8]) -> Result<Option<Request>> {
        let mut cursor = bytes;
        Request::read(&mut cursor).await
    }

    async fn decode_response(bytes: &[u8]) -> Result<Option<Response>> {
        let mut cursor = bytes;
        Response::read(&mut cursor).await
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let requests = [
            Request::Read {
                key: "mykey".to_string(),
            },
            Request::Append {
                key: "mykey".to_string(),
                value: "myvalue".to_string(),
            },
        ];
        for request in requests {
            let bytes = request.to_bytes().unwrap();
            let decoded = decode_request(&bytes).await.unwrap();
            assert_eq!(decoded, Some(request));
        }
    }

    #[tokio::test]
    async fn test_response_round_trip() {
        let responses = [
            Response::ReadResult {
                key: "k".to_string(),
                values: vec!["one".to_string(), "two".to_string()],
            },
            Response::ReadResult {
                key: "empty".to_string(),
                values: vec![],
            },
            Response::AppendCreated,
            Response::AppendExisted,
        ];
        for response in responses {
            let bytes = response.to_bytes().unwrap();
            let decoded = decode_response(&bytes).await.unwrap();
            assert_eq!(decoded, Some(response));
        }
    }

    #[tokio::test]
    async fn test_wire_layout() {
        let request = Request::Append {
            key: "ab".to_string(),
            value: "c".to_string(),
        };
        // magic, action 0x02, len-1 prefixed key, len-1 prefixed value
        assert_eq!(
            request.to_bytes().unwrap(),
            b"HDD\x02\x01ab\x00c".to_vec()
        );
    }

    #[tokio::test]
    async fn test_resync_skips_garbage() {
        let request = Request::Read {
            key: "key".to_string(),
        };
        let mut stream = b"some garbage bytes \xff\x00\x17".to_vec();
        stream.extend_from_slice(&request.to_bytes().unwrap());
        let decoded = decode_request(&stream).await.unwrap();
        assert_eq!(decoded, Some(request));
    }

    #[tokio::test]
    async fn test_resync_restarts_after_partial_magic() {
        let response = Response::AppendCreated;
        // "HD" starts a match that the 'x' breaks; the real magic follows.
        let mut stream = b"HDx".to_vec();
        stream.extend_from_slice(&response.to_bytes().unwrap());
        let decoded = decode_response(&stream).await.unwrap();
        assert_eq!(decoded, Some(response));
    }

    #[tokio::test]
    async fn test_clean_end_of_stream() {
        assert_eq!(decode_request(b"").await.unwrap(), None);
        assert_eq!(decode_response(b"").await.unwrap(), None);
        // EOF while still scanning for magic is also a clean close.
        assert_eq!(decode_request(b"HD").await.unwrap(), None);
        assert_eq!(decode_request(b"garbage").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_eof_mid_message_is_error() {
        // Magic completed but no action byte.
        assert!(decode_request(b"HDD").await.is_err());
        // Action byte but truncated key.
        assert!(decode_request(b"HDD\x01\x04ke").await.is_err());
        // Declared length with no bytes at all.
        assert!(decode_response(b"HDD\x01\x02").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_action_byte_is_error() {
        assert!(decode_request(b"HDD\x7f").await.is_err());
        assert!(decode_response(b"HDD\x7f").await.is_err());
    }

    #[tokio::test]
    async fn test_encode_rejects_out_of_range_strings() {
        let empty_key = Request::Read {
            key: String::new(),
        };
        assert!(empty_key.to_bytes().is_err());

        let oversized = Request::Append {
            key: "k".to_string(),
            value: "v".repeat(257),
        };
        assert!(oversized.to_bytes().is_err());

        // 256 bytes is the largest encodable string.
        let max = Request::Read {
            key: "k".repeat(256),
        };
        let bytes = max.to_bytes().unwrap();
        assert_eq!(decode_request(&bytes).await.unwrap(), Some(max));
    }

    #[tokio::test]
    async fn test_encode_rejects_too_many_values() {
        let response = Response::ReadResult {
            key: "k".to_string(),
            values: vec!["v".to_string(); 256],
        };
        assert!(response.to_bytes().is_err());
    }

    #[tokio::test]
    async fn test_multibyte_utf8_round_trip() {
        let request = Request::Append {
            key: "chave".to_string(),
            value: "ação-日本語".to_string(),
        };
        let bytes = request.to_bytes().unwrap();
        assert_eq!(decode_request(&bytes).await.unwrap(), Some(request));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_error() {
        // Valid framing, key bytes are not UTF-8.
        let stream = b"HDD\x01\x01\xff\xfe";
        assert!(decode_request(stream).await.is_err());
    }

    #[tokio::test]
    async fn test_two_messages_back_to_back() {
        let first = Request::Append {
            key: "k".to_string(),
            value: "v1".to_string(),
        };
        let second = Request::Read {
            key: "k".to_string(),
        };
        let mut stream = first.to_bytes().unwrap();
        stream.extend_from_slice(&second.to_bytes().unwrap());

        let mut cursor = stream.as_slice();
        assert_eq!(Request::read(&mut cursor).await.unwrap(), Some(first));
        assert_eq!(Request::read(&mut cursor).await.unwrap(), Some(second));
        assert_eq!(Request::read(&mut cursor).await.unwrap(), None);
    }
}
