//! Framed transport for the Chrome DevTools Protocol client core.
//!
//! Layers, bottom to top: [`socket`] (spec §4.A) is a plain stream pipe,
//! [`handshake`] (§4.B) upgrades it once, [`frame_codec`] (§4.C) encodes
//! and decodes individual frames with client-side masking, and
//! [`channel`] (§4.D) reassembles frames into messages and exposes the
//! callback surface the session multiplexer drives.

pub mod channel;
pub mod frame_codec;
pub mod handshake;
pub mod socket;

pub use channel::{ChannelConfig, ChannelError, ChannelState, MessageChannel, PolledMessage};
pub use handshake::HandshakeError;
pub use socket::{SocketError, StreamSocket};
