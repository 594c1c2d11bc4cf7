//! Caller-side helpers: acquire, execute and finish queries from a task.

use std::cell::RefCell;
use std::rc::Rc;

use evsql_driver::{Driver, Format, Param};
use evsql_pool::{Acquire, CallerId, Pool, PoolError, QueryId, QueryMode, QueryState, Result, TargetSelector};

use crate::host::TokioHost;

/// A pool shared by the tasks of one `LocalSet`.
pub type LocalPool<D> = Rc<RefCell<Pool<D, TokioHost>>>;

/// One caller task's view of the pool.
///
/// Every method borrows the pool only between suspension points. Dropping
/// the session tears the caller down: its queued entry and queries are
/// discarded, by the dispatcher if the pool is borrowed at the time.
pub struct Session<D: Driver> {
    pool: LocalPool<D>,
    host: TokioHost,
    caller: CallerId,
}

impl<D: Driver> Session<D> {
    /// Open a session with a fresh caller identity.
    pub fn new(pool: &LocalPool<D>, host: &TokioHost) -> Self {
        Self {
            pool: Rc::clone(pool),
            host: host.clone(),
            caller: host.register_caller(),
        }
    }

    /// This session's caller identity.
    #[must_use]
    pub fn caller(&self) -> CallerId {
        self.caller
    }

    /// Bind a query to a connection, waiting in line if the pool is full.
    pub async fn acquire<'a>(&self, target: impl Into<TargetSelector<'a>> + Copy) -> Result<QueryId> {
        let mode = QueryMode::Async { caller: self.caller };
        loop {
            let outcome = self.pool.borrow_mut().init_query(target, mode)?;
            match outcome {
                Acquire::Bound(id) => return Ok(id),
                Acquire::Queued => self.host.park(self.caller).await,
            }
        }
    }

    /// Submit `sql` and wait until the query leaves WAIT.
    pub async fn execute(&self, id: QueryId, sql: &str) -> Result<QueryState> {
        let state = self.pool.borrow_mut().submit(id, sql)?;
        self.settle(id, state).await
    }

    /// Parameterized variant of [`Session::execute`].
    pub async fn execute_params(
        &self,
        id: QueryId,
        sql: &str,
        format: Format,
        params: &[Param],
    ) -> Result<QueryState> {
        let state = self.pool.borrow_mut().submit_params(id, sql, format, params)?;
        self.settle(id, state).await
    }

    /// Release the query's connection.
    pub fn finish(&self, id: QueryId) -> Result<()> {
        self.pool.borrow_mut().cleanup(id)
    }

    /// The pool, for reading query results.
    #[must_use]
    pub fn pool(&self) -> &LocalPool<D> {
        &self.pool
    }

    async fn settle(&self, id: QueryId, mut state: QueryState) -> Result<QueryState> {
        while state == QueryState::Wait {
            self.host.park(self.caller).await;
            state = self
                .pool
                .borrow()
                .query(id)
                .map(|q| q.state())
                .ok_or(PoolError::UnknownQuery(id))?;
        }
        Ok(state)
    }
}

impl<D: Driver> Drop for Session<D> {
    fn drop(&mut self) {
        self.host.tear_down(self.caller);
        match self.pool.try_borrow_mut() {
            Ok(mut pool) => pool.teardown_caller(self.caller),
            Err(_) => {
                tracing::debug!(caller = %self.caller, "pool busy, deferring teardown");
                self.host.defer_teardown(self.caller);
            }
        }
    }
}
