//! The stream socket (spec §4.A): a reliable byte pipe with blocking
//! timeouts and independent send/recv halves so one side never stalls the
//! other.

use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation timed out")]
    Timeout,
}

/// Read-side state: the owned half plus whatever we've buffered ahead of
/// the caller (`recv_until` has to peek past the delimiter to find it, and
/// the handshake client hands any over-read bytes to the frame codec
/// rather than discarding them).
struct ReadHalfState {
    half: OwnedReadHalf,
    buf: BytesMut,
}

impl ReadHalfState {
    async fn fill_more(&mut self) -> Result<usize, SocketError> {
        let mut chunk = [0u8; 8192];
        let n = self.half.read(&mut chunk).await?;
        if n == 0 {
            return Err(SocketError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "peer closed the connection",
            )));
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

/// A plain TCP socket wrapped for the framing protocol's needs. Both
/// halves are guarded independently: a send in progress never blocks a
/// concurrent recv, and vice versa (spec §4.A, §5 "Shared resources").
pub struct StreamSocket {
    reader: Mutex<ReadHalfState>,
    writer: Mutex<OwnedWriteHalf>,
}

impl StreamSocket {
    /// Dial `host:port`, honoring the caller-supplied connect timeout.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self, SocketError> {
        let addr = format!("{host}:{port}");
        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SocketError::ConnectFailed(format!("timed out connecting to {addr}")))?
            .map_err(|e| SocketError::ConnectFailed(e.to_string()))?;
        stream.set_nodelay(true).ok();
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        let (half, writer) = stream.into_split();
        Self {
            reader: Mutex::new(ReadHalfState { half, buf: BytesMut::new() }),
            writer: Mutex::new(writer),
        }
    }

    /// Write `data` atomically; no internal queueing, one writer at a time.
    pub async fn send(&self, data: &[u8]) -> Result<(), SocketError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read up to `buf.len()` bytes, preferring anything already buffered.
    pub async fn recv(&self, buf: &mut [u8], read_timeout: Duration) -> Result<usize, SocketError> {
        let mut state = self.reader.lock().await;
        if state.buf.is_empty() {
            timeout(read_timeout, state.fill_more())
                .await
                .map_err(|_| SocketError::Timeout)??;
        }
        let n = buf.len().min(state.buf.len());
        state.buf.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }

    /// Read until `delimiter` is seen (inclusive), peeking ahead as needed
    /// so the search never consumes bytes past the match. Leftover bytes
    /// stay buffered for the next `recv_*` call.
    pub async fn recv_until(&self, delimiter: &[u8], overall_timeout: Duration) -> Result<Bytes, SocketError> {
        let deadline = tokio::time::Instant::now() + overall_timeout;
        let mut state = self.reader.lock().await;
        loop {
            if let Some(pos) = find_subslice(&state.buf, delimiter) {
                let end = pos + delimiter.len();
                let out = state.buf.split_to(end).freeze();
                return Ok(out);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(SocketError::Timeout);
            }
            timeout(remaining, state.fill_more())
                .await
                .map_err(|_| SocketError::Timeout)??;
        }
    }

    /// Read exactly `n` bytes.
    pub async fn recv_exact(&self, n: usize, overall_timeout: Duration) -> Result<Bytes, SocketError> {
        let deadline = tokio::time::Instant::now() + overall_timeout;
        let mut state = self.reader.lock().await;
        while state.buf.len() < n {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(SocketError::Timeout);
            }
            timeout(remaining, state.fill_more())
                .await
                .map_err(|_| SocketError::Timeout)??;
        }
        Ok(state.buf.split_to(n).freeze())
    }

    /// View the next `n` buffered bytes without consuming them, reading
    /// more from the socket first if not enough is buffered yet.
    pub async fn peek(&self, n: usize, overall_timeout: Duration) -> Result<Bytes, SocketError> {
        let deadline = tokio::time::Instant::now() + overall_timeout;
        let mut state = self.reader.lock().await;
        while state.buf.len() < n {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(SocketError::Timeout);
            }
            timeout(remaining, state.fill_more())
                .await
                .map_err(|_| SocketError::Timeout)??;
        }
        Ok(Bytes::copy_from_slice(&state.buf[..n]))
    }

    pub async fn close(&self) -> Result<(), SocketError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (StreamSocket, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            StreamSocket::connect("127.0.0.1", addr.port(), Duration::from_secs(1))
                .await
                .unwrap()
        });
        let (server, _) = listener.accept().await.unwrap();
        (client.await.unwrap(), server)
    }

    #[tokio::test]
    async fn recv_until_splits_at_delimiter_and_buffers_remainder() {
        let (client, mut server) = pair().await;
        server.write_all(b"HEADER\r\n\r\nBODY").await.unwrap();

        let head = client.recv_until(b"\r\n\r\n", Duration::from_secs(1)).await.unwrap();
        assert_eq!(&head[..], b"HEADER\r\n\r\n");

        let rest = client.recv_exact(4, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&rest[..], b"BODY");
    }

    #[tokio::test]
    async fn recv_times_out_on_silent_peer() {
        let (client, _server) = pair().await;
        let err = client.recv_exact(1, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, SocketError::Timeout));
    }
}
