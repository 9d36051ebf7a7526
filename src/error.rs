//! Error types for the peer pool and its collaborators.

use std::io;
use thiserror::Error;

/// Result type alias for peer cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the peer cache.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or a process-wide component set up twice.
    #[error("config error: {0}")]
    Config(String),

    /// Network communication errors.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// An inbound request named a group that is not registered locally.
    #[error("unable to find group [{0}]")]
    GroupNotFound(String),

    /// A call to a remote peer failed, either in transport or on the remote side.
    ///
    /// `key` is the cache key, or the operation name for membership pushes.
    #[error("remote call to [{peer}] for [{key}] failed: {reason}")]
    Remote {
        peer: String,
        key: String,
        reason: String,
    },

    /// The local getter could not produce a value.
    #[error("failed to load key [{key}]: {reason}")]
    Load { key: String, reason: String },

    /// The caller's deadline expired.
    #[error("operation timed out")]
    Timeout,

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a remote call error carrying the peer and key for diagnostics.
    pub fn remote(peer: impl Into<String>, key: impl Into<String>, reason: impl ToString) -> Self {
        Error::Remote {
            peer: peer.into(),
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a dial failure.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Error::Network(NetworkError::ConnectionFailed { .. }))
    }
}

/// Network communication errors.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed.
    #[error("connection failed to {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    /// Connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Failed to send message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Failed to receive message.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The peer answered with a message we did not ask for.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Network(NetworkError::Serialization(e.to_string()))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Network(NetworkError::Io(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_mentions_peer_and_key() {
        let err = Error::remote("10.0.0.2:9000", "user:1", "connection reset");
        let msg = err.to_string();
        assert!(msg.contains("10.0.0.2:9000"));
        assert!(msg.contains("user:1"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_connection_failure_classification() {
        let err: Error = NetworkError::ConnectionFailed {
            addr: "127.0.0.1:1".into(),
            reason: "refused".into(),
        }
        .into();
        assert!(err.is_connection_failure());
        assert!(!Error::Timeout.is_connection_failure());
    }

    #[test]
    fn test_group_not_found_display() {
        let err = Error::GroupNotFound("photos".into());
        assert_eq!(err.to_string(), "unable to find group [photos]");
    }
}
