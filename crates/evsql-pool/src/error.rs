//! Pool error types.

use thiserror::Error;

use crate::query::QueryId;
use crate::state::QueryState;

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors returned by pool and query operations.
///
/// Bookkeeping corruption is not represented here: it is reported through
/// [`invariant_violation`], which never returns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// A target with this name is already registered.
    #[error("target '{name}' is already registered")]
    DuplicateTarget {
        /// Target name.
        name: String,
    },

    /// No registered target matches.
    #[error("no database target found for '{name}'")]
    TargetNotFound {
        /// Name (or `user@host/database` for credential lookups).
        name: String,
    },

    /// The driver could not open a connection.
    #[error("connect to '{target}' failed: {message}")]
    Connect {
        /// Target name.
        target: String,
        /// Driver error text.
        message: String,
    },

    /// A synchronous caller hit the connection cap.
    #[error("no available connection (pool at capacity of {max})")]
    PoolExhausted {
        /// The configured cap.
        max: u16,
    },

    /// The driver reported a statement failure.
    #[error("query failed: {message}")]
    Query {
        /// Driver error text.
        message: String,
    },

    /// A result accessor was used without a populated result.
    #[error("query has no result")]
    NoResult,

    /// A cell accessor was outside the result set.
    #[error("cell ({row}, {col}) is out of range")]
    OutOfRange {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },

    /// The query has no bound connection.
    #[error("no connection was bound before the query")]
    NoConnection,

    /// The operation is not valid in the query's current state.
    #[error("cannot {operation} a query in state {state}")]
    InvalidState {
        /// Attempted operation.
        operation: &'static str,
        /// State at the time of the call.
        state: QueryState,
    },

    /// The query handle does not belong to this pool.
    #[error("unknown query handle {0}")]
    UnknownQuery(QueryId),

    /// Invalid configuration or target parameters.
    #[error("configuration error: {0}")]
    Config(String),

    /// The pool has been shut down.
    #[error("pool is shut down")]
    PoolClosed,
}

impl PoolError {
    /// The driver's error text for connect and query failures.
    #[must_use]
    pub fn driver_message(&self) -> Option<&str> {
        match self {
            Self::Connect { message, .. } | Self::Query { message } => Some(message),
            _ => None,
        }
    }
}

/// Report corrupted pool or query bookkeeping and abort the operation.
///
/// Continuing after such a fault would hand connections to the wrong query
/// or resume a caller twice, so this panics instead of returning an error.
#[cold]
#[track_caller]
#[allow(clippy::panic)]
pub(crate) fn invariant_violation(what: &str) -> ! {
    tracing::error!(violation = what, "connection pool invariant violated");
    panic!("evsql invariant violated: {what}");
}
