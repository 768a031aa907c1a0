//! Error types used by the session runtime and the gateway seam.
//!
//! - [`SessionError`] — lifecycle-level refusals raised by the manager.
//! - [`GatewayError`] — transport-level failures raised by a gateway.
//!
//! Both provide `as_label()` returning a short stable snake_case label for
//! logs. Transport errors are never terminal on their own (only an explicit
//! end/kick event drives a state transition); lifecycle refusals are surfaced
//! to the operator or admin who issued the command.

use thiserror::Error;

/// # Lifecycle refusals raised by the session manager.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A session already exists; one session at a time.
    #[error("a session is already active")]
    AlreadyConnected,

    /// No active session to operate on.
    #[error("no active session")]
    NotConnected,

    /// Caller is not the configured administrator.
    #[error("permission denied")]
    PermissionDenied,
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::AlreadyConnected => "session_already_active",
            SessionError::NotConnected => "session_not_connected",
            SessionError::PermissionDenied => "permission_denied",
        }
    }
}

/// # Transport-level failures raised by a gateway implementation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Dialing the remote endpoint failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The underlying connection is gone; the session will see an end event.
    #[error("connection closed")]
    Closed,

    /// I/O failure on the live connection.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A line that could not be encoded or decoded as an envelope message.
    #[error("envelope error: {0}")]
    Envelope(String),
}

impl GatewayError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            GatewayError::Connect(_) => "gateway_connect",
            GatewayError::Closed => "gateway_closed",
            GatewayError::Io(_) => "gateway_io",
            GatewayError::Envelope(_) => "gateway_envelope",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(SessionError::AlreadyConnected.as_label(), "session_already_active");
        assert_eq!(SessionError::NotConnected.as_label(), "session_not_connected");
        assert_eq!(SessionError::PermissionDenied.as_label(), "permission_denied");
        assert_eq!(GatewayError::Closed.as_label(), "gateway_closed");
    }
}
