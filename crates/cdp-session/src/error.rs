use cdp_protocol::RemoteError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("not connected")]
    Connection,
    #[error("synchronous call timed out")]
    Timeout,
    #[error("would deadlock: called from the reader task")]
    WouldDeadlock,
    #[error("remote error {0:?}")]
    Remote(RemoteError),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<cdp_transport::ChannelError> for SessionError {
    fn from(e: cdp_transport::ChannelError) -> Self {
        match e {
            cdp_transport::ChannelError::NotConnected => SessionError::Connection,
            other => SessionError::Protocol(other.to_string()),
        }
    }
}
