//! Per-query state.

use std::fmt;
use std::sync::Arc;

use evsql_driver::ResultSet;
use smallvec::SmallVec;

use crate::error::{PoolError, Result, invariant_violation};
use crate::host::ConnectionId;
use crate::registry::LogicalTarget;
use crate::state::{QueryMode, QueryState};

/// Handle to a query owned by a [`Pool`](crate::Pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub(crate) u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query#{}", self.0)
    }
}

/// One SQL operation and everything it produced.
///
/// Queries are created by [`Pool::init_query`](crate::Pool::init_query) and
/// driven by the pool; callers read them through
/// [`Pool::query`](crate::Pool::query).
pub struct Query<R> {
    id: QueryId,
    target: Arc<LogicalTarget>,
    mode: QueryMode,
    state: QueryState,
    error: Option<String>,
    result: Option<R>,
    connection: Option<ConnectionId>,
    trace: SmallVec<[QueryState; 6]>,
}

impl<R> Query<R> {
    pub(crate) fn new(
        id: QueryId,
        target: Arc<LogicalTarget>,
        mode: QueryMode,
        connection: ConnectionId,
    ) -> Self {
        let mut trace = SmallVec::new();
        trace.push(QueryState::Init);
        Self {
            id,
            target,
            mode,
            state: QueryState::Init,
            error: None,
            result: None,
            connection: Some(connection),
            trace,
        }
    }

    /// The query's handle.
    #[must_use]
    pub fn id(&self) -> QueryId {
        self.id
    }

    /// The target the query runs against.
    #[must_use]
    pub fn target(&self) -> &Arc<LogicalTarget> {
        &self.target
    }

    /// Execution mode.
    #[must_use]
    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Error text of a failed query.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The bound connection, if any.
    #[must_use]
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// States visited since the query was last bound, in order.
    #[must_use]
    pub fn transitions(&self) -> &[QueryState] {
        &self.trace
    }

    /// Whether a result set is held.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Log the error text at warn level.
    pub fn log_error(&self) {
        tracing::warn!(
            query_id = %self.id,
            target_name = %self.target.name(),
            "query error: {}",
            self.error.as_deref().unwrap_or("unknown")
        );
    }

    /// Move to `next`. An edge outside the transition table is a
    /// bookkeeping fault.
    pub(crate) fn transition(&mut self, next: QueryState) {
        if !self.state.can_transition_to(next) {
            invariant_violation(&format!(
                "{} cannot move from {} to {}",
                self.id, self.state, next
            ));
        }
        tracing::trace!(query_id = %self.id, from = %self.state, to = %next, "query transition");
        self.state = next;
        self.trace.push(next);
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.transition(QueryState::Error);
    }

    pub(crate) fn set_result(&mut self, result: Option<R>) {
        self.result = result;
    }

    pub(crate) fn take_connection(&mut self) -> Option<ConnectionId> {
        self.connection.take()
    }

    /// Release the result and the error text.
    pub(crate) fn clear(&mut self) {
        self.result = None;
        self.error = None;
    }

    /// Bind a fresh connection to a COMPLETE query and return it to INIT.
    pub(crate) fn rebind(&mut self, connection: ConnectionId) {
        if self.state != QueryState::Complete || self.result.is_some() || self.error.is_some() {
            invariant_violation(&format!("{} rebound before cleanup", self.id));
        }
        self.transition(QueryState::Init);
        self.trace.clear();
        self.trace.push(QueryState::Init);
        self.connection = Some(connection);
    }
}

impl<R: ResultSet> Query<R> {
    /// The result set, valid in RESULT or DONE.
    pub fn result(&self) -> Result<&R> {
        match self.state {
            QueryState::Result | QueryState::Done => self.result.as_ref().ok_or(PoolError::NoResult),
            _ => Err(PoolError::NoResult),
        }
    }

    /// Number of rows in the result.
    pub fn row_count(&self) -> Result<usize> {
        self.result().map(ResultSet::row_count)
    }

    /// Number of columns in the result.
    pub fn column_count(&self) -> Result<usize> {
        self.result().map(ResultSet::column_count)
    }

    /// Raw bytes of a cell. `NULL` reads as an empty slice; see
    /// [`Query::is_null`].
    pub fn get_value(&self, row: usize, col: usize) -> Result<&[u8]> {
        let rows = self.checked(row, col)?;
        Ok(rows.value(row, col).unwrap_or(&[]))
    }

    /// Length in bytes of a cell.
    pub fn get_length(&self, row: usize, col: usize) -> Result<usize> {
        let rows = self.checked(row, col)?;
        Ok(rows.length(row, col))
    }

    /// Whether a cell is `NULL`.
    pub fn is_null(&self, row: usize, col: usize) -> Result<bool> {
        let rows = self.checked(row, col)?;
        Ok(rows.value(row, col).is_none())
    }

    fn checked(&self, row: usize, col: usize) -> Result<&R> {
        let rows = self.result()?;
        if row >= rows.row_count() || col >= rows.column_count() {
            return Err(PoolError::OutOfRange { row, col });
        }
        Ok(rows)
    }
}

impl<R> fmt::Debug for Query<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("target", &self.target.name())
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("error", &self.error)
            .field("has_result", &self.result.is_some())
            .field("connection", &self.connection)
            .finish()
    }
}
