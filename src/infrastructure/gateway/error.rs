//! Gateway error types.

use thiserror::Error;

use super::protocol::ServerErrorId;

/// Errors raised by the gateway connection and its run loop.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Failed to establish the websocket connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server closed the connection.
    #[error("connection closed: code={code:?}, reason={reason}")]
    ConnectionClosed {
        /// Close code, when the server sent one.
        code: Option<u16>,
        /// Close reason, empty when none was given.
        reason: String,
    },

    /// Underlying websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The handshake did not produce an `Authenticated` frame.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server stopped answering keepalive probes.
    #[error("heartbeat timed out waiting for pong")]
    HeartbeatTimeout,

    /// A frame could not be encoded.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An operation exceeded its deadline.
    #[error("timed out during {operation}")]
    Timeout {
        /// What was being waited for.
        operation: String,
    },

    /// An internal channel between gateway tasks closed.
    #[error("internal channel closed")]
    ChannelClosed,

    /// The operation requires an established connection.
    #[error("not connected to gateway")]
    NotConnected,

    /// A connection is already running.
    #[error("already connected to gateway")]
    AlreadyConnected,

    /// The server reported a fatal error frame.
    #[error("server error: {code}")]
    Server {
        /// Error identifier from the frame.
        code: ServerErrorId,
    },

    /// The session this client presented no longer exists.
    #[error("session expired")]
    SessionExpired,

    /// Filesystem or socket I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Creates a connection failure error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Creates a websocket transport error.
    pub fn websocket(message: impl Into<String>) -> Self {
        Self::WebSocket(message.into())
    }

    /// Creates an authentication failure error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed(message.into())
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError(message.into())
    }

    /// Creates a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Whether reconnecting with the same session is worth attempting.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_)
            | Self::ConnectionClosed { .. }
            | Self::WebSocket(_)
            | Self::HeartbeatTimeout
            | Self::Timeout { .. }
            | Self::Io(_) => true,
            Self::Server { code } => !code.invalidates_session(),
            _ => false,
        }
    }
}

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_recoverable() {
        assert!(GatewayError::HeartbeatTimeout.is_recoverable());
        assert!(GatewayError::connection_failed("refused").is_recoverable());
        assert!(
            GatewayError::Server {
                code: ServerErrorId::InternalError
            }
            .is_recoverable()
        );
    }

    #[test]
    fn session_failures_are_not_recoverable() {
        assert!(!GatewayError::SessionExpired.is_recoverable());
        assert!(
            !GatewayError::Server {
                code: ServerErrorId::InvalidSession
            }
            .is_recoverable()
        );
    }
}
