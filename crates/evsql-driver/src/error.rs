//! Driver-level error types.

use thiserror::Error;

/// Errors reported by a database driver.
///
/// The pool distinguishes errors that leave the connection usable from
/// those that kill it; see [`DriverError::is_connection_fatal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Establishing the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The connection is dead (socket closed, protocol desync).
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The server rejected the statement (syntax, constraint, permissions).
    #[error("query failed: {0}")]
    Query(String),
}

impl DriverError {
    /// The driver's error text, without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Connect(msg) | Self::ConnectionLost(msg) | Self::Query(msg) => msg,
        }
    }

    /// Whether the connection this error came from must be destroyed.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::ConnectionLost(_))
    }
}
