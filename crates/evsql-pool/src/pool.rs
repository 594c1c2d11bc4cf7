//! Connection pool implementation.
//!
//! The pool owns every live driver connection, the wait queue and the
//! state of every query. Callers hold [`QueryId`] handles; the host event
//! loop reports readiness by [`ConnectionId`]. All mutation goes through
//! `&mut Pool`, which is the only synchronization the single-threaded
//! event loop needs.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use evsql_driver::{ConnectParams, Connection, Driver, DriverError, Format, Param, Reply, Socket};
use hashbrown::HashMap;

use crate::bridge::SuspensionBridge;
use crate::config::PoolConfig;
use crate::error::{PoolError, Result, invariant_violation};
use crate::host::{CallerId, ConnectionId, Host, HostEvent};
use crate::instrumentation::{SanitizationConfig, extract_operation};
use crate::lifecycle::ConnectionMetadata;
use crate::query::{Query, QueryId};
use crate::registry::{LogicalTarget, Registry, TargetSelector};
use crate::state::{QueryMode, QueryState};
use crate::wait_queue::WaitQueue;

/// Result set type produced by a driver.
pub type RowsOf<D> = <<D as Driver>::Connection as Connection>::Rows;

/// Outcome of binding a query to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Acquire {
    /// A connection is bound; the query is in INIT.
    Bound(QueryId),
    /// The pool is saturated. The caller has been suspended and queued and
    /// must retry once resumed.
    Queued,
}

impl Acquire {
    /// The bound query, if any.
    #[must_use]
    pub fn query(self) -> Option<QueryId> {
        match self {
            Self::Bound(id) => Some(id),
            Self::Queued => None,
        }
    }
}

/// The query currently using a connection.
#[derive(Debug, Clone, Copy)]
struct Job {
    query: QueryId,
    caller: Option<CallerId>,
}

struct PooledConnection<C> {
    target: Arc<LogicalTarget>,
    handle: C,
    busy: bool,
    job: Option<Job>,
    watching: Option<Socket>,
    metadata: ConnectionMetadata,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    connections_created: u64,
    connections_closed: u64,
    checkouts_successful: u64,
    checkouts_failed: u64,
    checkouts_queued: u64,
    waiters_woken: u64,
    queries_submitted: u64,
    queries_failed: u64,
}

/// A bounded pool of driver connections shared by many queries.
///
/// # Example
///
/// ```rust,ignore
/// use evsql_pool::{Acquire, PoolBuilder, QueryMode, QueryState};
///
/// let mut pool = PoolBuilder::new()
///     .max_connections(4)
///     .target("primary", params)
///     .build(driver, host)?;
///
/// // In a request handler:
/// match pool.init_query("primary", QueryMode::Async { caller })? {
///     Acquire::Bound(query) => {
///         pool.submit(query, "SELECT id, name FROM users")?;
///         // caller is suspended; resumed once the result arrives
///     }
///     Acquire::Queued => { /* suspended; retry init_query when resumed */ }
/// }
/// ```
pub struct Pool<D: Driver, H: Host> {
    config: PoolConfig,
    registry: Registry,
    driver: D,
    host: H,
    bridge: SuspensionBridge,
    connections: HashMap<ConnectionId, PooledConnection<D::Connection>>,
    free: VecDeque<ConnectionId>,
    waiters: WaitQueue,
    queries: HashMap<QueryId, Query<RowsOf<D>>>,
    next_connection_id: u64,
    next_query_id: u64,
    closed: bool,
    created_at: Instant,
    metrics: PoolMetricsInner,
}

impl<D: Driver, H: Host> Pool<D, H> {
    /// Create a pool with no registered targets.
    pub fn new(config: PoolConfig, driver: D, host: H) -> Result<Self> {
        config.validate()?;

        tracing::info!(max = config.max_connections, "connection pool created");

        Ok(Self {
            config,
            registry: Registry::new(),
            driver,
            host,
            bridge: SuspensionBridge::new(),
            connections: HashMap::new(),
            free: VecDeque::new(),
            waiters: WaitQueue::new(),
            queries: HashMap::new(),
            next_connection_id: 1,
            next_query_id: 1,
            closed: false,
            created_at: Instant::now(),
            metrics: PoolMetricsInner::default(),
        })
    }

    /// Register a database target.
    pub fn register_target(&mut self, name: impl Into<String>, params: ConnectParams) -> Result<()> {
        self.registry.register(name, params).map(drop)
    }

    /// The target registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Bind a new query to a connection for `target`.
    ///
    /// Reuses a free connection of the same target, or opens one while the
    /// pool is below its cap. At the cap, async callers are suspended and
    /// queued ([`Acquire::Queued`]) and sync callers get
    /// [`PoolError::PoolExhausted`].
    pub fn init_query<'a>(
        &mut self,
        target: impl Into<TargetSelector<'a>>,
        mode: QueryMode,
    ) -> Result<Acquire> {
        let target = Arc::clone(self.registry.resolve(target.into())?);

        let Some(conn_id) = self.acquire(&target, mode)? else {
            return Ok(Acquire::Queued);
        };

        let id = QueryId(self.next_query_id);
        self.next_query_id += 1;
        self.attach(conn_id, id, mode);
        self.queries.insert(id, Query::new(id, target, mode, conn_id));

        tracing::debug!(query_id = %id, connection_id = %conn_id, ?mode, "query bound");
        Ok(Acquire::Bound(id))
    }

    /// Bind a COMPLETE query to a connection again, returning it to INIT.
    pub fn reacquire(&mut self, id: QueryId) -> Result<Acquire> {
        let query = self.queries.get(&id).ok_or(PoolError::UnknownQuery(id))?;
        if query.state() != QueryState::Complete {
            return Err(PoolError::InvalidState {
                operation: "reuse",
                state: query.state(),
            });
        }
        let target = Arc::clone(query.target());
        let mode = query.mode();

        let Some(conn_id) = self.acquire(&target, mode)? else {
            return Ok(Acquire::Queued);
        };

        self.attach(conn_id, id, mode);
        self.query_mut(id).rebind(conn_id);

        tracing::debug!(query_id = %id, connection_id = %conn_id, "query rebound");
        Ok(Acquire::Bound(id))
    }

    /// Submit `sql` on the query's connection.
    ///
    /// Sync queries run inline and end in DONE. Async queries are sent,
    /// the socket is handed to the event loop, the caller is suspended and
    /// the query enters WAIT.
    pub fn submit(&mut self, id: QueryId, sql: &str) -> Result<QueryState> {
        self.dispatch(id, sql, None)
    }

    /// Submit `sql` with bound parameters.
    pub fn submit_params(
        &mut self,
        id: QueryId,
        sql: &str,
        format: Format,
        params: &[Param],
    ) -> Result<QueryState> {
        self.dispatch(id, sql, Some((params, format)))
    }

    fn dispatch(
        &mut self,
        id: QueryId,
        sql: &str,
        params: Option<(&[Param], Format)>,
    ) -> Result<QueryState> {
        let query = self.queries.get(&id).ok_or(PoolError::UnknownQuery(id))?;
        let conn_id = query.connection().ok_or(PoolError::NoConnection)?;
        if query.state() != QueryState::Init {
            return Err(PoolError::InvalidState {
                operation: "submit",
                state: query.state(),
            });
        }
        let mode = query.mode();

        tracing::debug!(
            query_id = %id,
            connection_id = %conn_id,
            operation = extract_operation(sql),
            sql = %self.config.sanitization.sanitize(sql),
            params = params.map_or(0, |(p, _)| p.len()),
            "submitting query"
        );
        self.metrics.queries_submitted += 1;

        let Some(conn) = self.connections.get_mut(&conn_id) else {
            invariant_violation(&format!("{id} bound to unknown {conn_id}"));
        };

        match mode {
            QueryMode::Sync => {
                let outcome = match params {
                    None => conn.handle.query(sql),
                    Some((params, format)) => conn.handle.query_params(sql, params, format),
                };
                match outcome {
                    Ok(rows) => {
                        let query = self.query_mut(id);
                        query.set_result(rows);
                        query.transition(QueryState::Done);
                        Ok(QueryState::Done)
                    }
                    Err(err) => Err(self.fail_submit(id, conn_id, err)),
                }
            }
            QueryMode::Async { caller } => {
                let sent = match params {
                    None => conn.handle.send_query(sql),
                    Some((params, format)) => conn.handle.send_query_params(sql, params, format),
                };
                if let Err(err) = sent {
                    return Err(self.fail_submit(id, conn_id, err));
                }

                let Some(socket) = conn.handle.socket() else {
                    invariant_violation(&format!("driver returned no socket for open {conn_id}"));
                };
                conn.watching = Some(socket);
                self.host.watch_readable(socket, conn_id);

                self.query_mut(id).transition(QueryState::Wait);
                self.bridge.suspend(&mut self.host, caller);
                Ok(QueryState::Wait)
            }
        }
    }

    fn fail_submit(&mut self, id: QueryId, conn_id: ConnectionId, err: DriverError) -> PoolError {
        self.metrics.queries_failed += 1;
        let message = err.message().to_string();
        tracing::debug!(query_id = %id, error = %err, "query submission failed");

        if err.is_connection_fatal() {
            // Leaves the query in ERROR.
            self.destroy_connection(conn_id, err);
        } else {
            self.query_mut(id).fail(message.clone());
        }
        PoolError::Query { message }
    }

    /// Route a readiness message from the host.
    ///
    /// Returns the state of the query attached to the connection, if any.
    pub fn handle_event(&mut self, event: HostEvent) -> Option<QueryState> {
        match event {
            HostEvent::Readable(conn_id) => self.on_readable(conn_id),
            HostEvent::Error(conn_id) => self.on_error(conn_id),
        }
    }

    /// The connection's socket is readable: advance its query.
    ///
    /// A query leaving WAIT has its socket unwatched and its caller resumed
    /// once. Events for connections that are gone or not waiting are
    /// ignored.
    pub fn on_readable(&mut self, conn_id: ConnectionId) -> Option<QueryState> {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            tracing::trace!(connection_id = %conn_id, "readiness for unknown connection");
            return None;
        };
        let Some(job) = conn.job else {
            tracing::trace!(connection_id = %conn_id, "readiness for idle connection");
            return None;
        };
        let Some(query) = self.queries.get_mut(&job.query) else {
            invariant_violation(&format!("{conn_id} attached to unknown {}", job.query));
        };
        if query.state() != QueryState::Wait {
            tracing::trace!(query_id = %job.query, state = %query.state(), "stale readiness");
            return Some(query.state());
        }

        match conn.handle.consume_input() {
            Err(err) if err.is_connection_fatal() => {
                self.destroy_connection(conn_id, err);
                return self.queries.get(&job.query).map(Query::state);
            }
            Err(err) => query.fail(err.message()),
            Ok(()) => read_reply(&mut conn.handle, query),
        }

        let next = query.state();
        tracing::trace!(query_id = %job.query, connection_id = %conn_id, state = %next, "readiness handled");

        if QueryState::Wait.resumes_caller(next) {
            if next == QueryState::Error {
                self.metrics.queries_failed += 1;
            }
            if let Some(socket) = conn.watching.take() {
                self.host.unwatch(socket);
            }
            if let Some(caller) = job.caller {
                self.bridge.resume(&mut self.host, caller);
            }
        }
        Some(next)
    }

    /// The host reported a fault on the connection's socket.
    pub fn on_error(&mut self, conn_id: ConnectionId) -> Option<QueryState> {
        let conn = self.connections.get(&conn_id)?;
        let query = conn.job.map(|job| job.query);
        let message = conn
            .handle
            .error_message()
            .unwrap_or_else(|| "socket error reported by event loop".to_string());

        self.destroy_connection(conn_id, DriverError::ConnectionLost(message));
        query.and_then(|id| self.queries.get(&id)).map(Query::state)
    }

    /// Close a connection after an unrecoverable error.
    ///
    /// An attached query that has not finished moves to ERROR with the
    /// driver's text and its caller is resumed if it was waiting. The freed
    /// slot wakes the next queued caller.
    pub fn destroy_connection(&mut self, conn_id: ConnectionId, error: DriverError) {
        let Some(conn) = self.connections.remove(&conn_id) else {
            return;
        };

        if !conn.busy {
            self.free.retain(|id| *id != conn_id);
        }
        if let Some(socket) = conn.watching {
            self.host.unwatch(socket);
        }

        tracing::warn!(
            connection_id = %conn_id,
            target_name = %conn.target.name(),
            error = %error,
            "destroying connection"
        );

        if let Some(job) = conn.job {
            if let Some(query) = self.queries.get_mut(&job.query) {
                query.take_connection();
                let prev = query.state();
                if matches!(prev, QueryState::Init | QueryState::Wait) {
                    query.fail(error.message());
                }
                if prev == QueryState::Wait {
                    self.metrics.queries_failed += 1;
                }
                if let Some(caller) = job.caller {
                    if prev.resumes_caller(query.state()) {
                        self.bridge.resume(&mut self.host, caller);
                    }
                }
            }
        }

        self.metrics.connections_closed += 1;
        drop(conn.handle);
        self.wake_next_waiter();
    }

    /// Release the query's result, error and connection; the query ends in
    /// COMPLETE. Calling it again is a no-op.
    pub fn cleanup(&mut self, id: QueryId) -> Result<()> {
        let query = self.queries.get_mut(&id).ok_or(PoolError::UnknownQuery(id))?;
        let prev = query.state();
        if prev == QueryState::Complete {
            return Ok(());
        }

        query.clear();
        let conn_id = query.take_connection();
        let caller = query.mode().caller();

        if prev == QueryState::Wait {
            if let Some(caller) = caller {
                self.bridge.forget(caller);
            }
        }
        if let Some(conn_id) = conn_id {
            self.release(conn_id, id, prev == QueryState::Wait);
        }

        self.query_mut(id).transition(QueryState::Complete);
        tracing::trace!(query_id = %id, "query cleaned up");
        Ok(())
    }

    /// Clean up the query and forget its handle.
    pub fn discard(&mut self, id: QueryId) -> Result<()> {
        self.cleanup(id)?;
        self.queries.remove(&id);
        Ok(())
    }

    /// Withdraw `caller` from the wait queue.
    ///
    /// Returns whether an entry was removed. The caller is not resumed.
    pub fn cancel_wait(&mut self, caller: CallerId) -> bool {
        let removed = self.waiters.remove(caller);
        if removed {
            self.bridge.forget(caller);
            tracing::debug!(%caller, "wait cancelled");
        }
        removed
    }

    /// Forget everything belonging to a caller the host has torn down.
    ///
    /// Its wait entry is removed and its async queries are cleaned up and
    /// discarded. Nothing is resumed for it.
    pub fn teardown_caller(&mut self, caller: CallerId) {
        self.waiters.remove(caller);
        self.bridge.forget(caller);

        let owned: Vec<QueryId> = self
            .queries
            .values()
            .filter(|q| q.mode().caller() == Some(caller))
            .map(Query::id)
            .collect();

        for id in &owned {
            if let Err(err) = self.discard(*id) {
                tracing::debug!(query_id = %id, error = %err, "discard during teardown failed");
            }
        }
        tracing::debug!(%caller, queries = owned.len(), "caller torn down");
    }

    /// Look up a query.
    #[must_use]
    pub fn query(&self, id: QueryId) -> Option<&Query<RowsOf<D>>> {
        self.queries.get(&id)
    }

    /// Close idle connections and refuse further acquisitions.
    ///
    /// Queued callers are resumed so their retry observes
    /// [`PoolError::PoolClosed`]. Connections in use are closed when their
    /// queries are cleaned up.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        while let Some(conn_id) = self.free.pop_front() {
            if self.connections.remove(&conn_id).is_some() {
                self.metrics.connections_closed += 1;
            }
        }
        while let Some(caller) = self.waiters.drain_one(|_| true) {
            self.bridge.resume(&mut self.host, caller);
        }

        tracing::info!(in_use = self.connections.len(), "connection pool shut down");
    }

    /// Whether [`Pool::shutdown`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let total = self.connections.len();
        let available = self.free.len();
        PoolStatus {
            available,
            in_use: total - available,
            total,
            max: usize::from(self.config.max_connections),
            waiting: self.waiters.len(),
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = &self.metrics;
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_closed: inner.connections_closed,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            checkouts_queued: inner.checkouts_queued,
            waiters_woken: inner.waiters_woken,
            queries_submitted: inner.queries_submitted,
            queries_failed: inner.queries_failed,
            uptime: self.created_at.elapsed(),
        }
    }

    /// Metadata of every live connection.
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionMetadata> {
        self.connections.values().map(|c| &c.metadata)
    }

    /// Whether the connection is in the free set.
    #[must_use]
    pub fn is_free(&self, conn_id: ConnectionId) -> bool {
        self.free.contains(&conn_id)
    }

    /// The callers queued for a connection, oldest first.
    pub fn waiting_callers(&self) -> impl Iterator<Item = CallerId> + '_ {
        self.waiters.iter().map(|e| e.caller)
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// The host adapter.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host adapter.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The driver.
    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn acquire(&mut self, target: &Arc<LogicalTarget>, mode: QueryMode) -> Result<Option<ConnectionId>> {
        if self.closed {
            self.metrics.checkouts_failed += 1;
            return Err(PoolError::PoolClosed);
        }

        if let Some(conn_id) = self.take_free(target.name()) {
            tracing::trace!(connection_id = %conn_id, target_name = %target.name(), "reusing free connection");
            return Ok(Some(conn_id));
        }

        let at_cap = self.connections.len() >= usize::from(self.config.max_connections);
        if at_cap && !self.free.is_empty() {
            self.evict_idle(target);
            let created = self.create_connection(target);
            if created.is_err() {
                self.wake_next_waiter();
            }
            return created.map(Some);
        }

        if at_cap {
            return match mode {
                QueryMode::Async { caller } => {
                    self.waiters.enqueue(caller);
                    self.bridge.suspend(&mut self.host, caller);
                    self.metrics.checkouts_queued += 1;
                    tracing::debug!(
                        %caller,
                        target_name = %target.name(),
                        waiting = self.waiters.len(),
                        "pool saturated, caller queued"
                    );
                    Ok(None)
                }
                QueryMode::Sync => {
                    self.metrics.checkouts_failed += 1;
                    Err(PoolError::PoolExhausted {
                        max: self.config.max_connections,
                    })
                }
            };
        }

        self.create_connection(target).map(Some)
    }

    fn take_free(&mut self, target_name: &str) -> Option<ConnectionId> {
        let mut found = None;
        for (pos, conn_id) in self.free.iter().enumerate() {
            let Some(conn) = self.connections.get(conn_id) else {
                invariant_violation(&format!("free set holds unknown {conn_id}"));
            };
            if conn.busy || conn.job.is_some() {
                invariant_violation(&format!("{conn_id} is in the free set but not free"));
            }
            if conn.target.name() == target_name {
                found = Some(pos);
                break;
            }
        }
        found.and_then(|pos| self.free.remove(pos))
    }

    /// Close the oldest free connection. Only other targets are left in the
    /// free set when this runs.
    fn evict_idle(&mut self, wanted: &LogicalTarget) {
        let Some(idle) = self.free.pop_front() else {
            return;
        };
        if let Some(conn) = self.connections.remove(&idle) {
            self.metrics.connections_closed += 1;
            tracing::debug!(
                connection_id = %idle,
                target_name = %conn.target.name(),
                wanted = %wanted.name(),
                "evicting idle connection of another target"
            );
        }
    }

    fn create_connection(&mut self, target: &Arc<LogicalTarget>) -> Result<ConnectionId> {
        match self.driver.connect(target.params()) {
            Ok(handle) => {
                let conn_id = ConnectionId(self.next_connection_id);
                self.next_connection_id += 1;
                self.connections.insert(
                    conn_id,
                    PooledConnection {
                        target: Arc::clone(target),
                        handle,
                        busy: false,
                        job: None,
                        watching: None,
                        metadata: ConnectionMetadata::new(conn_id, target.name()),
                    },
                );
                self.metrics.connections_created += 1;
                tracing::debug!(
                    connection_id = %conn_id,
                    target_name = %target.name(),
                    live = self.connections.len(),
                    "connection opened"
                );
                Ok(conn_id)
            }
            Err(err) => {
                self.metrics.checkouts_failed += 1;
                tracing::warn!(target_name = %target.name(), error = %err, "connect failed");
                Err(PoolError::Connect {
                    target: target.name().to_string(),
                    message: err.message().to_string(),
                })
            }
        }
    }

    fn attach(&mut self, conn_id: ConnectionId, query: QueryId, mode: QueryMode) {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            invariant_violation(&format!("attaching {query} to unknown {conn_id}"));
        };
        if conn.busy || conn.job.is_some() {
            invariant_violation(&format!("{conn_id} attached to two queries"));
        }
        conn.busy = true;
        conn.job = Some(Job {
            query,
            caller: mode.caller(),
        });
        conn.metadata.record_checkout();
        self.metrics.checkouts_successful += 1;

        // A caller that got a connection is running and no longer waits.
        if let Some(caller) = mode.caller() {
            self.waiters.remove(caller);
            self.bridge.forget(caller);
        }
    }

    /// `in_flight` is set when the query was abandoned before its reply was
    /// read; such a connection is closed, never reused.
    fn release(&mut self, conn_id: ConnectionId, query: QueryId, in_flight: bool) {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            invariant_violation(&format!("{query} released unknown {conn_id}"));
        };
        match conn.job {
            Some(job) if job.query == query && conn.busy => {}
            _ => invariant_violation(&format!("{conn_id} released by {query} it is not attached to")),
        }

        if let Some(socket) = conn.watching.take() {
            self.host.unwatch(socket);
        }
        let drained = conn.handle.drain();
        if drained > 0 {
            tracing::trace!(connection_id = %conn_id, drained, "discarded unread results");
        }
        conn.job = None;
        conn.busy = false;
        let unsettled = in_flight || conn.handle.is_busy();

        if unsettled {
            self.connections.remove(&conn_id);
            self.metrics.connections_closed += 1;
            tracing::debug!(connection_id = %conn_id, %query, "closing connection with a reply in flight");
        } else if self.closed {
            self.connections.remove(&conn_id);
            self.metrics.connections_closed += 1;
            tracing::debug!(connection_id = %conn_id, "connection closed after shutdown");
        } else {
            self.free.push_back(conn_id);
            tracing::trace!(connection_id = %conn_id, "connection released");
        }

        self.wake_next_waiter();
    }

    fn wake_next_waiter(&mut self) {
        let host = &self.host;
        let bridge = &mut self.bridge;
        let next = self.waiters.drain_one(|caller| {
            let alive = host.is_alive(caller);
            if !alive {
                bridge.forget(caller);
            }
            alive
        });

        if let Some(caller) = next {
            self.metrics.waiters_woken += 1;
            tracing::debug!(%caller, "waking queued caller");
            self.bridge.resume(&mut self.host, caller);
        }
    }

    fn query_mut(&mut self, id: QueryId) -> &mut Query<RowsOf<D>> {
        match self.queries.get_mut(&id) {
            Some(query) => query,
            None => invariant_violation(&format!("{id} vanished")),
        }
    }
}

/// Advance a waiting query with whatever the driver has completed.
fn read_reply<C: Connection>(handle: &mut C, query: &mut Query<C::Rows>) {
    if handle.is_busy() {
        return;
    }
    match handle.next_result() {
        None | Some(Reply::CommandOk) => query.transition(QueryState::Done),
        Some(Reply::Rows(rows)) => {
            query.set_result(Some(rows));
            query.transition(QueryState::Result);
        }
        Some(Reply::Error(message)) => query.fail(message),
        Some(Reply::Other) => {}
    }
}

impl<D: Driver, H: Host> fmt::Debug for Pool<D, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("status", &self.status())
            .field("targets", &self.registry.len())
            .field("queries", &self.queries.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = PoolBuilder::new()
///     .max_connections(8)
///     .target("primary", primary_params)
///     .target("reporting", reporting_params)
///     .build(driver, host)?;
/// ```
#[derive(Debug, Default)]
pub struct PoolBuilder {
    pool_config: PoolConfig,
    targets: Vec<(String, ConnectParams)>,
}

impl PoolBuilder {
    /// Create a new pool builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: u16) -> Self {
        self.pool_config.max_connections = count;
        self
    }

    /// Set how SQL text is rendered in logs.
    #[must_use]
    pub fn sanitization(mut self, sanitization: SanitizationConfig) -> Self {
        self.pool_config.sanitization = sanitization;
        self
    }

    /// Register a target when the pool is built.
    #[must_use]
    pub fn target(mut self, name: impl Into<String>, params: ConnectParams) -> Self {
        self.targets.push((name.into(), params));
        self
    }

    /// Build the pool.
    pub fn build<D: Driver, H: Host>(self, driver: D, host: H) -> Result<Pool<D, H>> {
        let mut pool = Pool::new(self.pool_config, driver, host)?;
        for (name, params) in self.targets {
            pool.register_target(name, params)?;
        }
        Ok(pool)
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: usize,
    /// Number of connections currently in use.
    pub in_use: usize,
    /// Total number of connections.
    pub total: usize,
    /// Maximum allowed connections.
    pub max: usize,
    /// Number of callers in the wait queue.
    pub waiting: usize,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.max as f64) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections opened since pool start.
    pub connections_created: u64,
    /// Total connections closed since pool start.
    pub connections_closed: u64,
    /// Queries that were bound to a connection.
    pub checkouts_successful: u64,
    /// Acquisitions that failed (pool exhausted, connect error, closed).
    pub checkouts_failed: u64,
    /// Acquisitions that queued the caller.
    pub checkouts_queued: u64,
    /// Queued callers that were resumed.
    pub waiters_woken: u64,
    /// Queries submitted.
    pub queries_submitted: u64,
    /// Queries that ended in an error.
    pub queries_failed: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }

    /// Calculate query success rate (0.0 to 1.0).
    #[must_use]
    pub fn query_success_rate(&self) -> f64 {
        if self.queries_submitted == 0 {
            return 1.0;
        }
        let successful = self.queries_submitted.saturating_sub(self.queries_failed);
        successful as f64 / self.queries_submitted as f64
    }
}
