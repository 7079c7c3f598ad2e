//! Unified error types for the Tether core.
//!
//! Every per-message failure is local to one connection. Codec and
//! transport failures are wrapped into [`ConnectionError`] together with
//! the outcome of the close attempt that always follows them.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Codec Errors
// =============================================================================

/// Errors raised by the wire codec pipeline.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The marshal strategy failed to serialize or deserialize a value.
    #[error("{strategy} marshal failed: {reason}")]
    Marshal {
        /// Name of the marshal strategy.
        strategy: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// The decode target cannot be produced by the marshal strategy.
    #[error("{strategy} marshal cannot decode into {target}")]
    TypeMismatch {
        /// Name of the marshal strategy.
        strategy: &'static str,
        /// Description of the requested target.
        target: &'static str,
    },

    /// The crypto strategy failed to encrypt the payload.
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// The crypto strategy failed to decrypt the payload.
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

impl CodecError {
    /// Creates a marshal error for the named strategy.
    pub fn marshal(strategy: &'static str, reason: impl fmt::Display) -> Self {
        Self::Marshal {
            strategy,
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors reported by a [`Session`](crate::transport::Session).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The peer closed the connection or the session is already shut down.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Connection could not be established.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Reading or writing a frame failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Creates a connection-closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Close Errors
// =============================================================================

/// A closing callback returned an error or panicked.
#[derive(Debug, Clone, Error)]
#[error("closing callback #{index} failed: {message}")]
pub struct CallbackError {
    /// Position of the callback in registration order.
    pub index: usize,
    /// Error message or panic payload.
    pub message: String,
}

/// Errors surfaced by [`Connection::close`](crate::Connection::close).
#[derive(Debug, Clone, Error)]
pub enum CloseError {
    /// Closing the underlying session failed.
    #[error("transport close failed: {0}")]
    Transport(TransportError),

    /// A closing callback failed.
    #[error(transparent)]
    Callback(CallbackError),

    /// Both the session close and a closing callback failed.
    #[error("transport close failed: {transport} and {callback}")]
    Both {
        /// Session close failure.
        transport: TransportError,
        /// First callback failure.
        callback: CallbackError,
    },
}

impl CloseError {
    /// Combines the two independent close outcomes into one error, if any.
    pub fn from_parts(
        transport: Option<TransportError>,
        callback: Option<CallbackError>,
    ) -> Option<Self> {
        match (transport, callback) {
            (None, None) => None,
            (Some(transport), None) => Some(Self::Transport(transport)),
            (None, Some(callback)) => Some(Self::Callback(callback)),
            (Some(transport), Some(callback)) => Some(Self::Both {
                transport,
                callback,
            }),
        }
    }
}

// =============================================================================
// Connection Errors
// =============================================================================

/// Errors returned by [`Connection`](crate::Connection) operations.
///
/// Every variant except [`Closed`](Self::Closed) means the connection has
/// been closed as a side effect; `close` carries the failure of that close
/// attempt, if it failed.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection was already closed; no I/O was performed.
    #[error("connection has been closed")]
    Closed,

    /// The outgoing value could not be encoded.
    #[error("failed to encode message: {source}{}", extra(.close))]
    Encode {
        /// Codec failure.
        source: CodecError,
        /// Failure of the close that followed.
        close: Option<CloseError>,
    },

    /// The inbound frame could not be decoded.
    #[error("failed to decode message: {source}{}", extra(.close))]
    Decode {
        /// Codec failure.
        source: CodecError,
        /// Failure of the close that followed.
        close: Option<CloseError>,
    },

    /// Writing the encoded frame to the session failed.
    #[error("failed to send message: {source}{}", extra(.close))]
    Write {
        /// Transport failure.
        source: TransportError,
        /// Failure of the close that followed.
        close: Option<CloseError>,
    },

    /// Reading a frame from the session failed.
    #[error("failed to receive message: {source}{}", extra(.close))]
    Read {
        /// Transport failure.
        source: TransportError,
        /// Failure of the close that followed.
        close: Option<CloseError>,
    },
}

impl ConnectionError {
    /// Returns the close failure attached to this error, if any.
    pub fn close_error(&self) -> Option<&CloseError> {
        match self {
            Self::Closed => None,
            Self::Encode { close, .. }
            | Self::Decode { close, .. }
            | Self::Write { close, .. }
            | Self::Read { close, .. } => close.as_ref(),
        }
    }

    /// Returns `true` for the fail-fast error on an already closed connection.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

fn extra(close: &Option<CloseError>) -> String {
    match close {
        Some(e) => format!(" and close operation reported an extra error: {e}"),
        None => String::new(),
    }
}

// =============================================================================
// Registration and Handshake Errors
// =============================================================================

/// Errors raised while populating a [`HandlerRegistry`](crate::HandlerRegistry).
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A handler is already bound to this action; the existing one is kept.
    #[error("repeated handler registration: {0}")]
    DuplicateAction(String),
}

/// Reasons a WebSocket upgrade is rejected.
#[derive(Debug, Clone, Error)]
pub enum HandshakeError {
    /// The upgrade request carried no usable Origin header.
    #[error("null origin")]
    NullOrigin,

    /// The Origin header is not an absolute URL.
    #[error("invalid origin '{origin}': {reason}")]
    InvalidOrigin {
        /// The raw header value.
        origin: String,
        /// Parse failure.
        reason: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for session operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_error_from_parts() {
        assert!(CloseError::from_parts(None, None).is_none());

        let transport = TransportError::Io("reset".into());
        let callback = CallbackError {
            index: 0,
            message: "boom".into(),
        };
        let both = CloseError::from_parts(Some(transport), Some(callback)).unwrap();
        assert!(matches!(both, CloseError::Both { .. }));
        assert_eq!(
            both.to_string(),
            "transport close failed: I/O error: reset and closing callback #0 failed: boom"
        );
    }

    #[test]
    fn test_connection_error_mentions_close_failure() {
        let err = ConnectionError::Read {
            source: TransportError::closed("eof"),
            close: Some(CloseError::Transport(TransportError::Io("broken pipe".into()))),
        };
        let text = err.to_string();
        assert!(text.starts_with("failed to receive message: connection closed: eof"));
        assert!(text.ends_with(
            "and close operation reported an extra error: transport close failed: I/O error: broken pipe"
        ));
        assert!(err.close_error().is_some());
        assert!(!err.is_closed());
    }
}
