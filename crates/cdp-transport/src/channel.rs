//! The message channel (spec §4.D): owns the socket, handshake, and frame
//! codec; exposes message-level send/recv plus a callback surface. Does
//! not own a reader task itself — `poll`/`poll_all` are the primitive the
//! session multiplexer drives from its own dedicated task (spec §4.E, §5).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use cdp_protocol::{OpCode, WsFrame};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace, warn};
use url::Url;

use crate::frame_codec::{self, CodecError};
use crate::handshake::{self, HandshakeError, HandshakeTarget};
use crate::socket::{SocketError, StreamSocket};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("not connected")]
    NotConnected,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("message exceeds configured maximum size")]
    MessageTooBig,
}

/// Mirrors spec §4.D's channel state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Closing = 3,
    Closed = 4,
}

impl ChannelState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ChannelState::Disconnected,
            1 => ChannelState::Connecting,
            2 => ChannelState::Connected,
            3 => ChannelState::Closing,
            _ => ChannelState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    /// Cap on a fully reassembled message (spec §4.C default 64 MiB).
    pub max_message_size: usize,
    /// Optional cap on any single frame, independent of the message cap
    /// (supplemented from `original_source`'s reference client).
    pub max_frame_size: Option<usize>,
    pub io_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024 * 1024,
            max_frame_size: None,
            io_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// A result produced by one `poll`: either no complete user message arrived
/// within the timeout, or a text/binary payload ready for dispatch.
#[derive(Debug)]
pub enum PolledMessage {
    None,
    Text(String),
    Binary(Bytes),
}

/// A single callback slot: set-once, replaceable, and safe to swap while
/// another thread is mid-invocation (spec §9: the value is cloned out
/// before the lock is released).
struct Slot<T: ?Sized>(Mutex<Option<Arc<T>>>);

impl<T: ?Sized> Slot<T> {
    fn new() -> Self {
        Self(Mutex::new(None))
    }

    fn set(&self, f: Arc<T>) {
        *self.0.lock() = Some(f);
    }

    fn get(&self) -> Option<Arc<T>> {
        self.0.lock().clone()
    }
}

struct Callbacks {
    on_open: Slot<dyn Fn() + Send + Sync>,
    on_message: Slot<dyn Fn(&str) + Send + Sync>,
    on_binary: Slot<dyn Fn(&[u8]) + Send + Sync>,
    on_close: Slot<dyn Fn(u16, &str) + Send + Sync>,
    on_error: Slot<dyn Fn(&str) + Send + Sync>,
    on_pong: Slot<dyn Fn(&[u8]) + Send + Sync>,
}

impl Callbacks {
    fn new() -> Self {
        Self {
            on_open: Slot::new(),
            on_message: Slot::new(),
            on_binary: Slot::new(),
            on_close: Slot::new(),
            on_error: Slot::new(),
            on_pong: Slot::new(),
        }
    }
}

/// State carried across `poll` calls for a message being reassembled from
/// fragments (spec §4.C fragmentation).
struct Reassembly {
    opcode: OpCode,
    buf: BytesMut,
}

pub struct MessageChannel {
    socket: StreamSocket,
    config: ChannelConfig,
    state: AtomicU8,
    callbacks: Callbacks,
    reassembly: Mutex<Option<Reassembly>>,
    last_activity: Mutex<Instant>,
}

impl MessageChannel {
    /// Parse `url`, dial, run the opening handshake, and transition to
    /// connected (spec §4.D `connect`).
    pub async fn connect(url: &str, config: ChannelConfig) -> Result<Self, ChannelError> {
        let parsed = Url::parse(url).map_err(|e| ChannelError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ChannelError::InvalidUrl("missing host".to_string()))?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| ChannelError::InvalidUrl("missing port".to_string()))?;
        let path = if parsed.query().is_some() {
            format!("{}?{}", parsed.path(), parsed.query().unwrap())
        } else {
            parsed.path().to_string()
        };

        debug!(%host, port, %path, "opening CDP channel");

        let socket = StreamSocket::connect(&host, port, config.connect_timeout).await?;
        handshake::perform(
            &socket,
            HandshakeTarget { host: &host, port, path: &path },
            config.io_timeout,
        )
        .await?;

        let channel = Self {
            socket,
            config,
            state: AtomicU8::new(ChannelState::Connected as u8),
            callbacks: Callbacks::new(),
            reassembly: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
        };
        if let Some(cb) = channel.callbacks.on_open.get() {
            cb();
        }
        Ok(channel)
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, s: ChannelState) {
        self.state.store(s as u8, Ordering::Release);
    }

    pub fn set_on_open<F: Fn() + Send + Sync + 'static>(&self, f: F) {
        self.callbacks.on_open.set(Arc::new(f));
    }
    pub fn set_on_message<F: Fn(&str) + Send + Sync + 'static>(&self, f: F) {
        self.callbacks.on_message.set(Arc::new(f));
    }
    pub fn set_on_binary<F: Fn(&[u8]) + Send + Sync + 'static>(&self, f: F) {
        self.callbacks.on_binary.set(Arc::new(f));
    }
    pub fn set_on_close<F: Fn(u16, &str) + Send + Sync + 'static>(&self, f: F) {
        self.callbacks.on_close.set(Arc::new(f));
    }
    pub fn set_on_error<F: Fn(&str) + Send + Sync + 'static>(&self, f: F) {
        self.callbacks.on_error.set(Arc::new(f));
    }
    pub fn set_on_pong<F: Fn(&[u8]) + Send + Sync + 'static>(&self, f: F) {
        self.callbacks.on_pong.set(Arc::new(f));
    }

    /// Time since any inbound frame (including PONG) was last observed,
    /// used by the multiplexer's heartbeat (spec §4.E).
    pub fn idle_duration(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    fn touch_activity(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    async fn send_frame(&self, frame: WsFrame) -> Result<(), ChannelError> {
        let encoded = frame_codec::encode(&frame);
        self.socket.send(&encoded).await?;
        Ok(())
    }

    /// Atomic frame write; returns false if not connected.
    pub async fn send_text(&self, text: &str) -> Result<bool, ChannelError> {
        if self.state() != ChannelState::Connected {
            return Ok(false);
        }
        self.send_frame(WsFrame::text(Bytes::copy_from_slice(text.as_bytes()))).await?;
        Ok(true)
    }

    pub async fn send_binary(&self, data: &[u8]) -> Result<bool, ChannelError> {
        if self.state() != ChannelState::Connected {
            return Ok(false);
        }
        self.send_frame(WsFrame::binary(Bytes::copy_from_slice(data))).await?;
        Ok(true)
    }

    pub async fn ping(&self, payload: &[u8]) -> Result<(), ChannelError> {
        self.send_frame(WsFrame::ping(Bytes::copy_from_slice(payload))).await
    }

    pub async fn close(&self, code: u16, reason: &str) -> Result<(), ChannelError> {
        if self.state() == ChannelState::Closed {
            return Ok(());
        }
        self.set_state(ChannelState::Closing);
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        let result = self.send_frame(WsFrame::close(payload)).await;
        self.set_state(ChannelState::Closed);
        if let Some(cb) = self.callbacks.on_close.get() {
            cb(code, reason);
        }
        result
    }

    /// Read at most one complete message, reassembling fragments as
    /// needed. Control frames are handled transparently and never count
    /// as "a message" (spec §4.D).
    pub async fn poll(&self, timeout: Duration) -> Result<PolledMessage, ChannelError> {
        if self.state() != ChannelState::Connected {
            return Err(ChannelError::NotConnected);
        }
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() && timeout != Duration::ZERO {
                return Ok(PolledMessage::None);
            }
            let budget = if timeout == Duration::ZERO { Duration::ZERO } else { remaining };

            let frame = match frame_codec::read_frame(&self.socket, budget.max(Duration::from_millis(1)), self.config.max_frame_size).await {
                Ok(frame) => frame,
                Err(CodecError::Socket(SocketError::Timeout)) => return Ok(PolledMessage::None),
                Err(e) => {
                    self.fail_with_protocol_error(&e.to_string()).await;
                    return Err(e.into());
                }
            };
            self.touch_activity();

            match frame.opcode {
                OpCode::Ping => {
                    trace!("answering PING with PONG");
                    self.send_frame(WsFrame::pong(frame.payload.clone())).await?;
                    continue;
                }
                OpCode::Pong => {
                    if let Some(cb) = self.callbacks.on_pong.get() {
                        cb(&frame.payload);
                    }
                    continue;
                }
                OpCode::Close => {
                    let (code, reason) = parse_close_payload(&frame.payload);
                    if self.state() != ChannelState::Closing {
                        // Reciprocal close, per spec §4.C.
                        let _ = self.send_frame(WsFrame::close(frame.payload.to_vec())).await;
                    }
                    self.set_state(ChannelState::Closed);
                    if let Some(cb) = self.callbacks.on_close.get() {
                        cb(code, &reason);
                    }
                    return Ok(PolledMessage::None);
                }
                OpCode::Continuation => {
                    let mut guard = self.reassembly.lock();
                    let Some(state) = guard.as_mut() else {
                        drop(guard);
                        self.fail_with_protocol_error("continuation frame without a start frame").await;
                        return Err(ChannelError::Protocol("continuation without start".to_string()));
                    };
                    state.buf.extend_from_slice(&frame.payload);
                    if state.buf.len() > self.config.max_message_size {
                        drop(guard);
                        *self.reassembly.lock() = None;
                        self.close(1009, "message too big").await.ok();
                        return Err(ChannelError::MessageTooBig);
                    }
                    if frame.fin {
                        let finished = guard.take().unwrap();
                        drop(guard);
                        return Ok(self.deliver(finished.opcode, finished.buf.freeze()));
                    }
                    continue;
                }
                OpCode::Text | OpCode::Binary => {
                    if self.reassembly.lock().is_some() {
                        self.fail_with_protocol_error("data frame arrived mid-fragment-sequence").await;
                        return Err(ChannelError::Protocol("data frame mid-sequence".to_string()));
                    }
                    if frame.payload.len() > self.config.max_message_size {
                        self.close(1009, "message too big").await.ok();
                        return Err(ChannelError::MessageTooBig);
                    }
                    if frame.fin {
                        return Ok(self.deliver(frame.opcode, frame.payload));
                    }
                    *self.reassembly.lock() = Some(Reassembly {
                        opcode: frame.opcode,
                        buf: BytesMut::from(&frame.payload[..]),
                    });
                    continue;
                }
            }
        }
    }

    /// Drive `poll` until the channel has no immediately readable data,
    /// returning the count of user messages handled (spec §4.D). This is
    /// the primitive the multiplexer's reader task runs in a loop.
    pub async fn poll_all(&self, initial_timeout: Duration) -> Result<usize, ChannelError> {
        let mut handled = 0;
        let mut timeout = initial_timeout;
        loop {
            match self.poll(timeout).await? {
                PolledMessage::None => break,
                _ => handled += 1,
            }
            timeout = Duration::ZERO;
        }
        Ok(handled)
    }

    fn deliver(&self, opcode: OpCode, payload: Bytes) -> PolledMessage {
        match opcode {
            OpCode::Text => {
                let text = String::from_utf8_lossy(&payload).into_owned();
                if let Some(cb) = self.callbacks.on_message.get() {
                    cb(&text);
                }
                PolledMessage::Text(text)
            }
            OpCode::Binary => {
                if let Some(cb) = self.callbacks.on_binary.get() {
                    cb(&payload);
                }
                PolledMessage::Binary(payload)
            }
            _ => unreachable!("deliver only called for Text/Binary"),
        }
    }

    async fn fail_with_protocol_error(&self, message: &str) {
        warn!(%message, "closing channel after protocol error");
        if let Some(cb) = self.callbacks.on_error.get() {
            cb(message);
        }
        self.set_state(ChannelState::Closed);
    }
}

fn parse_close_payload(payload: &[u8]) -> (u16, String) {
    if payload.len() < 2 {
        return (1005, String::new());
    }
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
    (code, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_payload_without_code_defaults_to_1005() {
        let (code, reason) = parse_close_payload(&[]);
        assert_eq!(code, 1005);
        assert_eq!(reason, "");
    }

    #[test]
    fn close_payload_parses_code_and_reason() {
        let mut payload = vec![0x03, 0xe8]; // 1000
        payload.extend_from_slice(b"bye");
        let (code, reason) = parse_close_payload(&payload);
        assert_eq!(code, 1000);
        assert_eq!(reason, "bye");
    }
}
