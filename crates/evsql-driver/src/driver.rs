//! Driver traits.
//!
//! A [`Driver`] opens [`Connection`]s. Each connection supports two
//! execution paths:
//!
//! - **blocking**: [`Connection::query`] / [`Connection::query_params`]
//!   run the statement and fetch the whole result before returning
//! - **non-blocking**: [`Connection::send_query`] queues the statement, then
//!   every time the connection's [`Socket`] turns readable the caller runs
//!   [`Connection::consume_input`], checks [`Connection::is_busy`] and pulls
//!   completed replies with [`Connection::next_result`]

use std::fmt;

use crate::connect::ConnectParams;
use crate::error::DriverError;
use crate::params::{Format, Param};

/// OS-level socket handle of a connection (a file descriptor on Unix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Socket(pub i32);

impl Socket {
    /// The raw descriptor.
    #[must_use]
    pub fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}

/// A completed reply pulled from a connection.
#[derive(Debug)]
pub enum Reply<R> {
    /// The statement completed without producing rows.
    CommandOk,
    /// The statement produced a result set.
    Rows(R),
    /// The server reported an error for this statement.
    Error(String),
    /// A reply the connection manager does not act on (copy streams,
    /// non-fatal notices). The query keeps waiting.
    Other,
}

/// Factory for connections.
pub trait Driver {
    /// Connection type produced by this driver.
    type Connection: Connection;

    /// Open a connection. Blocks until connected or failed.
    fn connect(&mut self, params: &ConnectParams) -> Result<Self::Connection, DriverError>;
}

/// A live driver connection.
///
/// Dropping the connection closes it.
pub trait Connection {
    /// Result set type.
    type Rows: ResultSet;

    /// Socket to watch for read-readiness, `None` if the connection has no
    /// open socket.
    fn socket(&self) -> Option<Socket>;

    /// Run a statement and fetch its complete result.
    ///
    /// Returns `Ok(None)` for statements that produce no rows.
    fn query(&mut self, sql: &str) -> Result<Option<Self::Rows>, DriverError>;

    /// Parameterized variant of [`Connection::query`].
    fn query_params(
        &mut self,
        sql: &str,
        params: &[Param],
        format: Format,
    ) -> Result<Option<Self::Rows>, DriverError>;

    /// Queue a statement without waiting for the reply.
    fn send_query(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Parameterized variant of [`Connection::send_query`].
    fn send_query_params(
        &mut self,
        sql: &str,
        params: &[Param],
        format: Format,
    ) -> Result<(), DriverError>;

    /// Read whatever protocol data is available on the socket.
    fn consume_input(&mut self) -> Result<(), DriverError>;

    /// Whether the driver still needs more data before the next reply is
    /// complete.
    fn is_busy(&self) -> bool;

    /// Take the next completed reply, `None` once the statement is finished.
    fn next_result(&mut self) -> Option<Reply<Self::Rows>>;

    /// The driver's description of the last connection-level failure.
    fn error_message(&self) -> Option<String> {
        None
    }

    /// Discard every reply that has already completed. Returns how many were
    /// dropped.
    ///
    /// Never waits: a reply the driver is still receiving stays on the wire.
    /// The pool closes such connections instead of reusing them.
    fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.next_result().is_some() {
            dropped += 1;
        }
        dropped
    }
}

/// Raw access to a result set.
pub trait ResultSet {
    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Number of columns.
    fn column_count(&self) -> usize;

    /// Cell bytes, `None` for SQL `NULL`.
    ///
    /// `row` and `col` are in range; callers check against
    /// [`row_count`](ResultSet::row_count) and
    /// [`column_count`](ResultSet::column_count) first.
    fn value(&self, row: usize, col: usize) -> Option<&[u8]>;

    /// Cell length in bytes (0 for `NULL`).
    fn length(&self, row: usize, col: usize) -> usize {
        self.value(row, col).map_or(0, <[u8]>::len)
    }
}
