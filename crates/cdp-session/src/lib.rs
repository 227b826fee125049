//! Session multiplexing on top of the framed transport: request/response
//! correlation, event dispatch, heartbeat, and auto-reconnect.

mod correlation;
mod error;
mod multiplexer;
mod subscription;

pub use cdp_transport::ChannelConfig;
pub use correlation::CompletionResult;
pub use error::SessionError;
pub use multiplexer::{Session, SessionConfig, SessionState};
pub use subscription::{Handler, SubscriptionToken};
