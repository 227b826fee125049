//! The error-kind taxonomy shared across the workspace (spec §7).
//!
//! Every crate in the workspace defines its own `thiserror` enum for the
//! errors it can actually produce, but classifies each variant into one of
//! these kinds so a caller at the top of the stack can match on "what kind
//! of thing went wrong" without caring which crate raised it.

/// Coarse error classification used throughout the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CdpErrorKind {
    /// Transport not established, or lost mid-operation.
    Connection,
    /// The opening handshake response was not a valid upgrade.
    HandshakeRejected,
    /// Malformed frame, masked server frame, or bad continuation.
    ProtocolError,
    /// Reassembled payload exceeded the configured cap.
    MessageTooBig,
    /// A synchronous wait or readiness probe exceeded its budget.
    Timeout,
    /// A synchronous API was invoked from the reader task itself.
    WouldDeadlock,
    /// The peer's response carried a structured `error` object.
    RemoteError,
    /// The browser process exited before becoming ready.
    ProcessDied,
    /// No installation was found, or the spawn syscall failed.
    LaunchFailed,
    /// The provisioner could not resolve a machine/user identifier.
    SigningFailed,
}

/// Categorization of a [`RemoteError`](crate::RemoteError) by inspecting its
/// numeric code range and message prefix, per spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorCategory {
    Protocol,
    Target,
    NotFound,
    InvalidState,
    Timeout,
    Other,
}

impl RemoteErrorCategory {
    /// Classify a CDP `error.{code,message}` pair.
    ///
    /// CDP reuses JSON-RPC-ish codes loosely; -32600..-32000 are reserved
    /// protocol-level codes, everything else is domain-specific and we fall
    /// back to sniffing the message text the way the C++ reference client
    /// does (`TypedResponses.hpp`'s `classify_error`).
    pub fn classify(code: i32, message: &str) -> Self {
        if (-32768..=-32000).contains(&code) {
            return RemoteErrorCategory::Protocol;
        }
        let lower = message.to_ascii_lowercase();
        if lower.contains("not found") || lower.contains("no target") {
            RemoteErrorCategory::NotFound
        } else if lower.contains("timed out") || lower.contains("timeout") {
            RemoteErrorCategory::Timeout
        } else if lower.contains("target") || lower.contains("session") {
            RemoteErrorCategory::Target
        } else if lower.contains("state") || lower.contains("not allowed") {
            RemoteErrorCategory::InvalidState
        } else {
            RemoteErrorCategory::Other
        }
    }
}
