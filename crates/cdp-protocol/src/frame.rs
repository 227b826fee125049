//! The logical websocket frame shape (spec §3 "Frame").
//!
//! This is the value the codec in `cdp-transport` produces and consumes; it
//! carries no notion of masking (masking is purely a wire-level concern of
//! the encoder/decoder, spec §4.C) and no notion of fragmentation (that is
//! reassembled by the channel before a `WsFrame` is ever handed upward as a
//! complete message).

use bytes::Bytes;

/// The six opcodes recognized by the framing protocol (spec §3, §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    /// Decode the low 4 bits of the first frame header byte.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte & 0x0f {
            0x0 => Some(OpCode::Continuation),
            0x1 => Some(OpCode::Text),
            0x2 => Some(OpCode::Binary),
            0x8 => Some(OpCode::Close),
            0x9 => Some(OpCode::Ping),
            0xA => Some(OpCode::Pong),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// A single websocket frame: `{ fin, opcode, payload }` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsFrame {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: Bytes,
}

impl WsFrame {
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self { fin, opcode, payload: payload.into() }
    }

    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, payload)
    }

    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, payload)
    }

    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, payload)
    }

    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, payload)
    }

    pub fn close(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Close, payload)
    }
}
