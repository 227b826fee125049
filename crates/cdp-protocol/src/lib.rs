//! Wire data model for the Chrome DevTools Protocol client core.
//!
//! This crate defines the shapes carried over the framed transport
//! (`cdp-transport`) and correlated by the session multiplexer
//! (`cdp-session`): requests, responses, events, and the websocket frame
//! the session layer never sees directly but whose shape (opcode, fin,
//! payload) is part of the contract between the two crates.

mod error;
mod frame;
mod message;

pub use error::{CdpErrorKind, RemoteErrorCategory};
pub use frame::{OpCode, WsFrame};
pub use message::{Id, InboundMessage, RemoteError, Request, ResponseOutcome};
