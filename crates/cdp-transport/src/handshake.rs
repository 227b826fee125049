//! The opening-handshake client (spec §4.B): upgrades a plain stream to
//! the framing protocol.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::socket::{SocketError, StreamSocket};

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("socket error: {0}")]
    Socket(#[from] SocketError),
    #[error("malformed HTTP response: {0}")]
    MalformedResponse(String),
    #[error("handshake rejected: status {status} {reason}")]
    Rejected { status: u16, reason: String },
}

/// Target of an opening handshake.
pub struct HandshakeTarget<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

/// Perform the client-side opening handshake over an already-connected
/// socket. Returns the accept key's client-side nonce is internal; callers
/// only need to know it either succeeds or doesn't.
pub async fn perform(
    socket: &StreamSocket,
    target: HandshakeTarget<'_>,
    io_timeout: Duration,
) -> Result<(), HandshakeError> {
    let mut nonce_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = BASE64.encode(nonce_bytes);

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {nonce}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        path = target.path,
        host = target.host,
        port = target.port,
        nonce = nonce,
    );
    socket.send(request.as_bytes()).await?;

    let raw = socket.recv_until(b"\r\n\r\n", io_timeout).await?;
    let (status, reason, accept) = parse_upgrade_response(&raw)?;

    if status != 101 {
        return Err(HandshakeError::Rejected { status, reason });
    }

    let expected = expected_accept_key(&nonce);
    match accept {
        Some(value) if value == expected => Ok(()),
        Some(_) => Err(HandshakeError::Rejected {
            status,
            reason: "Sec-WebSocket-Accept mismatch".to_string(),
        }),
        None => Err(HandshakeError::Rejected {
            status,
            reason: "missing Sec-WebSocket-Accept".to_string(),
        }),
    }
}

fn expected_accept_key(nonce: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce.as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

fn parse_upgrade_response(raw: &[u8]) -> Result<(u16, String, Option<String>), HandshakeError> {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut headers);
    response
        .parse(raw)
        .map_err(|e| HandshakeError::MalformedResponse(e.to_string()))?;

    let status = response
        .code
        .ok_or_else(|| HandshakeError::MalformedResponse("missing status code".to_string()))?;
    let reason = response.reason.unwrap_or("").to_string();

    let accept = response
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Sec-WebSocket-Accept"))
        .map(|h| String::from_utf8_lossy(h.value).to_string());

    Ok((status, reason, accept))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc6455_example() {
        // From RFC 6455 §1.3's worked example.
        let nonce = "dGhlIHNhbXBsZSBub25jZQ==";
        assert_eq!(expected_accept_key(nonce), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn parses_successful_upgrade() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\n\
                    Upgrade: websocket\r\n\
                    Connection: Upgrade\r\n\
                    Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n";
        let (status, _reason, accept) = parse_upgrade_response(raw).unwrap();
        assert_eq!(status, 101);
        assert_eq!(accept.as_deref(), Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    }

    #[test]
    fn rejects_non_101() {
        let raw = b"HTTP/1.1 404 Not Found\r\n\r\n";
        let (status, reason, _) = parse_upgrade_response(raw).unwrap();
        assert_eq!(status, 404);
        assert_eq!(reason, "Not Found");
    }
}
