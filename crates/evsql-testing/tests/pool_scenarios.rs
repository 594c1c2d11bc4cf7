//! Pool behaviour against the scripted mock driver and recording host.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::VecDeque;

use evsql_driver::{Connection, Driver, Reply, Socket};
use evsql_pool::{
    Acquire, CallerId, ConnectParams, DriverError, Format, HostEvent, Param, PoolBuilder, PoolError,
    QueryId, QueryMode, QueryState, TargetSelector,
};
use evsql_testing::{HostCall, MockDriver, MockPool, MockRows, RecordingHost, Response, Step, init_tracing};

const A: CallerId = CallerId(1);
const B: CallerId = CallerId(2);
const C: CallerId = CallerId(3);
const D: CallerId = CallerId(4);

fn params() -> ConnectParams {
    ConnectParams::new()
        .host("db.internal")
        .user("app")
        .password("secret")
        .database("shop")
}

fn pool_with(cap: u16) -> (MockPool, MockDriver, RecordingHost) {
    init_tracing();
    let driver = MockDriver::new();
    let host = RecordingHost::new();
    let pool = PoolBuilder::new()
        .max_connections(cap)
        .target("primary", params())
        .build(driver.clone(), host.clone())
        .unwrap();
    (pool, driver, host)
}

fn bound(acquire: Acquire) -> QueryId {
    match acquire {
        Acquire::Bound(id) => id,
        Acquire::Queued => panic!("expected a connection, caller was queued"),
    }
}

fn on(caller: CallerId) -> QueryMode {
    QueryMode::Async { caller }
}

fn state(pool: &MockPool, id: QueryId) -> QueryState {
    pool.query(id).unwrap().state()
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_duplicate_target_keeps_first_registration() {
    let (mut pool, _, _) = pool_with(2);

    let err = pool
        .register_target("primary", ConnectParams::new().host("elsewhere"))
        .unwrap_err();

    assert_eq!(
        err,
        PoolError::DuplicateTarget {
            name: "primary".into()
        }
    );
    assert_eq!(pool.registry().len(), 1);
    assert_eq!(pool.registry().lookup("primary").unwrap().params().host, "db.internal");
}

#[test]
fn test_unknown_target() {
    let (mut pool, driver, _) = pool_with(2);

    let err = pool.init_query("replica", QueryMode::Sync).unwrap_err();
    assert!(matches!(err, PoolError::TargetNotFound { .. }));
    assert_eq!(driver.connect_count(), 0);
}

#[test]
fn test_lookup_by_credentials() {
    let (mut pool, _, _) = pool_with(2);

    let selector = TargetSelector::Credentials {
        host: "db.internal",
        user: "app",
        password: "secret",
        database: "shop",
    };
    let id = bound(pool.init_query(selector, QueryMode::Sync).unwrap());
    assert_eq!(pool.query(id).unwrap().target().name(), "primary");

    let wrong = TargetSelector::Credentials {
        host: "db.internal",
        user: "app",
        password: "guess",
        database: "shop",
    };
    assert!(matches!(
        pool.init_query(wrong, QueryMode::Sync),
        Err(PoolError::TargetNotFound { .. })
    ));
}

// =============================================================================
// Acquisition and the cap
// =============================================================================

#[test]
fn test_sync_callers_beyond_cap_are_refused() {
    let (mut pool, driver, _) = pool_with(2);

    let first = pool.init_query("primary", QueryMode::Sync).unwrap();
    let second = pool.init_query("primary", QueryMode::Sync).unwrap();
    let third = pool.init_query("primary", QueryMode::Sync);

    assert!(matches!(first, Acquire::Bound(_)));
    assert!(matches!(second, Acquire::Bound(_)));
    assert_eq!(third, Err(PoolError::PoolExhausted { max: 2 }));
    assert_eq!(driver.connect_count(), 2);

    let status = pool.status();
    assert_eq!(status.total, 2);
    assert_eq!(status.in_use, 2);
    assert!(status.is_at_capacity());
}

#[test]
fn test_free_connection_is_reused() {
    let (mut pool, driver, _) = pool_with(2);

    let q1 = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    let conn = pool.query(q1).unwrap().connection().unwrap();
    pool.cleanup(q1).unwrap();
    assert!(pool.is_free(conn));

    let q2 = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    assert_eq!(pool.query(q2).unwrap().connection(), Some(conn));
    assert_eq!(driver.connect_count(), 1);
    assert!(!pool.is_free(conn));
}

#[test]
fn test_free_connection_of_other_target_is_not_reused() {
    let (mut pool, driver, _) = pool_with(3);
    pool.register_target("reporting", ConnectParams::new().host("olap.internal"))
        .unwrap();

    let q1 = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    let idle = pool.query(q1).unwrap().connection().unwrap();
    pool.cleanup(q1).unwrap();

    let q2 = bound(pool.init_query("reporting", QueryMode::Sync).unwrap());
    assert_ne!(pool.query(q2).unwrap().connection(), Some(idle));
    assert_eq!(driver.connect_count(), 2);
    assert!(pool.is_free(idle));
}

#[test]
fn test_idle_connection_of_other_target_gives_way_at_cap() {
    let (mut pool, driver, _) = pool_with(2);
    pool.register_target("reporting", ConnectParams::new().host("olap.internal"))
        .unwrap();

    let q1 = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    let idle = pool.query(q1).unwrap().connection().unwrap();
    pool.cleanup(q1).unwrap();
    let _q2 = bound(pool.init_query("reporting", QueryMode::Sync).unwrap());

    let q3 = bound(pool.init_query("reporting", QueryMode::Sync).unwrap());
    assert_ne!(pool.query(q3).unwrap().connection(), Some(idle));
    assert!(!pool.is_free(idle));
    assert_eq!(driver.connect_count(), 3);
    assert_eq!(driver.open_connections(), 2);
    assert_eq!(pool.status().total, 2);
    assert_eq!(pool.metrics().connections_closed, 1);

    // Nothing idle left to evict.
    assert_eq!(
        pool.init_query("primary", QueryMode::Sync),
        Err(PoolError::PoolExhausted { max: 2 })
    );
}

#[test]
fn test_waiter_for_other_target_is_served_after_release() {
    let (mut pool, driver, host) = pool_with(1);
    pool.register_target("reporting", ConnectParams::new().host("olap.internal"))
        .unwrap();

    let qa = bound(pool.init_query("primary", on(A)).unwrap());
    assert_eq!(pool.init_query("reporting", on(B)).unwrap(), Acquire::Queued);

    pool.cleanup(qa).unwrap();
    assert_eq!(host.resumed(), [B]);

    let qb = bound(pool.init_query("reporting", on(B)).unwrap());
    assert_eq!(pool.query(qb).unwrap().target().name(), "reporting");
    assert_eq!(driver.connect_count(), 2);
    assert_eq!(pool.status().total, 1);
    assert_eq!(pool.status().waiting, 0);
}

#[test]
fn test_connect_failure_creates_nothing() {
    let (mut pool, driver, _) = pool_with(2);
    driver.fail_next_connect("Access denied for user 'app'");

    let err = pool.init_query("primary", QueryMode::Sync).unwrap_err();
    assert_eq!(
        err,
        PoolError::Connect {
            target: "primary".into(),
            message: "Access denied for user 'app'".into(),
        }
    );
    assert_eq!(err.driver_message(), Some("Access denied for user 'app'"));
    assert_eq!(pool.status().total, 0);

    assert!(pool.init_query("primary", QueryMode::Sync).is_ok());
    assert_eq!(pool.metrics().checkouts_failed, 1);
}

// =============================================================================
// Async queries
// =============================================================================

#[test]
fn test_async_handoff_at_cap_one() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond("SELECT 1", Response::rows(MockRows::single("1")));

    let qa = bound(pool.init_query("primary", on(A)).unwrap());
    assert_eq!(pool.submit(qa, "SELECT 1").unwrap(), QueryState::Wait);
    assert_eq!(host.suspend_count(A), 1);

    assert_eq!(pool.init_query("primary", on(B)).unwrap(), Acquire::Queued);
    assert_eq!(host.suspend_count(B), 1);
    assert_eq!(pool.status().waiting, 1);

    let conn = pool.query(qa).unwrap().connection().unwrap();
    assert_eq!(pool.handle_event(HostEvent::Readable(conn)), Some(QueryState::Result));
    assert_eq!(host.resumed(), [A]);
    assert_eq!(pool.query(qa).unwrap().get_value(0, 0).unwrap(), b"1");

    pool.cleanup(qa).unwrap();
    assert_eq!(state(&pool, qa), QueryState::Complete);
    assert_eq!(host.resumed(), [A, B]);

    let qb = bound(pool.init_query("primary", on(B)).unwrap());
    assert_eq!(pool.query(qb).unwrap().connection(), Some(conn));
    assert_eq!(driver.connect_count(), 1);
    assert_eq!(pool.status().total, 1);
    assert_eq!(pool.status().waiting, 0);
}

#[test]
fn test_incomplete_read_keeps_waiting() {
    let (mut pool, driver, host) = pool_with(2);
    driver.respond("SELECT pg_sleep(1)", Response::command_ok().after_pending(2));

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "SELECT pg_sleep(1)").unwrap();
    let conn = host.watched_connection().unwrap();

    assert_eq!(pool.on_readable(conn), Some(QueryState::Wait));
    assert_eq!(pool.on_readable(conn), Some(QueryState::Wait));
    assert_eq!(host.resume_count(A), 0);
    assert_eq!(host.watched().len(), 1);

    assert_eq!(pool.on_readable(conn), Some(QueryState::Done));
    assert_eq!(host.resume_count(A), 1);
    assert!(host.watched().is_empty());
    assert_eq!(
        pool.query(q).unwrap().transitions(),
        &[QueryState::Init, QueryState::Wait, QueryState::Done]
    );
}

#[test]
fn test_caller_resumed_once_per_wait_exit() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond("SELECT name FROM users", Response::rows(MockRows::single("alice")));

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "SELECT name FROM users").unwrap();
    let conn = pool.query(q).unwrap().connection().unwrap();

    assert_eq!(pool.on_readable(conn), Some(QueryState::Result));
    // Stale readiness after the query left WAIT.
    assert_eq!(pool.on_readable(conn), Some(QueryState::Result));
    assert_eq!(host.resume_count(A), 1);

    pool.cleanup(q).unwrap();
    assert_eq!(pool.on_readable(conn), None);
    assert_eq!(host.resume_count(A), 1);
}

#[test]
fn test_notice_reply_keeps_waiting() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond(
        "COPY users TO STDOUT",
        Response::steps([Step::Notice, Step::Pending, Step::CommandOk]),
    );

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "COPY users TO STDOUT").unwrap();
    let conn = host.watched_connection().unwrap();

    assert_eq!(pool.on_readable(conn), Some(QueryState::Wait));
    assert_eq!(pool.on_readable(conn), Some(QueryState::Wait));
    assert_eq!(pool.on_readable(conn), Some(QueryState::Done));
    assert_eq!(host.resume_count(A), 1);
}

#[test]
fn test_server_error_moves_to_error() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond(
        "SELECT * FROM missing",
        Response::error("Table 'shop.missing' doesn't exist"),
    );

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "SELECT * FROM missing").unwrap();
    let conn = host.watched_connection().unwrap();

    assert_eq!(pool.on_readable(conn), Some(QueryState::Error));
    let query = pool.query(q).unwrap();
    assert_eq!(query.error(), Some("Table 'shop.missing' doesn't exist"));
    assert_eq!(query.row_count(), Err(PoolError::NoResult));
    query.log_error();
    assert_eq!(host.resume_count(A), 1);

    // A server error leaves the connection usable.
    pool.cleanup(q).unwrap();
    assert_eq!(pool.status().available, 1);
    assert_eq!(pool.metrics().queries_failed, 1);
}

#[test]
fn test_read_error_keeps_connection() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond("SELECT 1", Response::steps([Step::ReadError("bad packet".into())]));

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "SELECT 1").unwrap();
    let conn = host.watched_connection().unwrap();

    assert_eq!(pool.on_readable(conn), Some(QueryState::Error));
    assert_eq!(pool.query(q).unwrap().error(), Some("bad packet"));
    assert_eq!(pool.status().total, 1);
}

#[test]
fn test_submit_twice_is_rejected() {
    let (mut pool, _, _) = pool_with(1);

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "SELECT 1").unwrap();

    assert_eq!(
        pool.submit(q, "SELECT 2"),
        Err(PoolError::InvalidState {
            operation: "submit",
            state: QueryState::Wait,
        })
    );
}

#[test]
fn test_multi_result_leftovers_are_drained_on_release() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond(
        "CALL monthly_report()",
        Response::rows(MockRows::single("jan")).then(Step::Rows(MockRows::single("feb"))),
    );

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "CALL monthly_report()").unwrap();
    let conn = host.watched_connection().unwrap();

    assert_eq!(pool.on_readable(conn), Some(QueryState::Result));
    assert_eq!(pool.query(q).unwrap().get_value(0, 0).unwrap(), b"jan");

    pool.cleanup(q).unwrap();
    assert_eq!(driver.drained(), 1);
}

// =============================================================================
// Sync queries
// =============================================================================

#[test]
fn test_sync_query_result() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond(
        "SELECT id, email FROM users",
        Response::rows(
            MockRows::new(2)
                .row([Some("1"), Some("a@example.com")])
                .row([Some("2"), None]),
        ),
    );

    let q = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    assert_eq!(pool.submit(q, "SELECT id, email FROM users"), Ok(QueryState::Done));

    let query = pool.query(q).unwrap();
    assert_eq!(query.row_count(), Ok(2));
    assert_eq!(query.column_count(), Ok(2));
    assert_eq!(query.get_value(0, 1).unwrap(), b"a@example.com");
    assert_eq!(query.get_length(0, 1), Ok(13));
    assert_eq!(query.is_null(1, 1), Ok(true));
    assert_eq!(query.get_value(5, 0), Err(PoolError::OutOfRange { row: 5, col: 0 }));

    // Sync mode never touches the scheduler or the event loop.
    assert!(host.calls().is_empty());
}

#[test]
fn test_sync_params() {
    let (mut pool, driver, _) = pool_with(1);

    let q = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    let state = pool
        .submit_params(
            q,
            "UPDATE users SET email = ? WHERE id = ?",
            Format::Text,
            &[Param::from("b@example.com"), Param::from(2_i64)],
        )
        .unwrap();

    assert_eq!(state, QueryState::Done);
    assert!(!pool.query(q).unwrap().has_result());
    assert_eq!(driver.statements(), ["UPDATE users SET email = ? WHERE id = ?"]);
}

#[test]
fn test_sync_server_error() {
    let (mut pool, driver, _) = pool_with(1);
    driver.respond("DELETE FROM", Response::error("syntax error near end of input"));

    let q = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    assert_eq!(
        pool.submit(q, "DELETE FROM"),
        Err(PoolError::Query {
            message: "syntax error near end of input".into()
        })
    );
    assert_eq!(state(&pool, q), QueryState::Error);
    assert_eq!(pool.status().total, 1);
}

#[test]
fn test_fatal_send_error_destroys_connection() {
    let (mut pool, driver, _) = pool_with(1);
    driver.respond(
        "SELECT 1",
        Response::send_fails(DriverError::ConnectionLost("broken pipe".into())),
    );

    let q = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    assert_eq!(
        pool.submit(q, "SELECT 1"),
        Err(PoolError::Query {
            message: "broken pipe".into()
        })
    );
    assert_eq!(state(&pool, q), QueryState::Error);
    assert_eq!(pool.query(q).unwrap().connection(), None);
    assert_eq!(pool.status().total, 0);
    assert_eq!(driver.open_connections(), 0);
}

// =============================================================================
// Release, cleanup and reuse
// =============================================================================

#[test]
fn test_cleanup_is_idempotent() {
    let (mut pool, _, _) = pool_with(1);

    let q = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    pool.submit(q, "SELECT 1").unwrap();

    pool.cleanup(q).unwrap();
    pool.cleanup(q).unwrap();

    assert_eq!(state(&pool, q), QueryState::Complete);
    assert_eq!(pool.query(q).unwrap().connection(), None);
    let status = pool.status();
    assert_eq!(status.available, 1);
    assert_eq!(status.in_use, 0);
}

#[test]
fn test_reacquire_after_cleanup() {
    let (mut pool, driver, _) = pool_with(1);

    let q = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    pool.submit(q, "SELECT 1").unwrap();

    assert_eq!(
        pool.reacquire(q),
        Err(PoolError::InvalidState {
            operation: "reuse",
            state: QueryState::Done,
        })
    );

    pool.cleanup(q).unwrap();
    assert_eq!(pool.reacquire(q), Ok(Acquire::Bound(q)));
    assert_eq!(state(&pool, q), QueryState::Init);
    assert_eq!(pool.query(q).unwrap().transitions(), &[QueryState::Init]);

    assert_eq!(pool.submit(q, "SELECT 2"), Ok(QueryState::Done));
    assert_eq!(driver.connect_count(), 1);
}

#[test]
fn test_discard_forgets_handle() {
    let (mut pool, _, _) = pool_with(1);

    let q = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    pool.discard(q).unwrap();

    assert!(pool.query(q).is_none());
    assert_eq!(pool.submit(q, "SELECT 1"), Err(PoolError::UnknownQuery(q)));
    assert_eq!(pool.cleanup(q), Err(PoolError::UnknownQuery(q)));
    assert_eq!(pool.status().available, 1);
}

// =============================================================================
// Wait queue
// =============================================================================

#[test]
fn test_waiters_are_resumed_in_fifo_order() {
    let (mut pool, _, host) = pool_with(1);

    let qa = bound(pool.init_query("primary", on(A)).unwrap());
    for caller in [B, C, D] {
        assert_eq!(pool.init_query("primary", on(caller)).unwrap(), Acquire::Queued);
    }
    assert_eq!(pool.waiting_callers().collect::<Vec<_>>(), [B, C, D]);

    pool.cleanup(qa).unwrap();
    let qb = bound(pool.init_query("primary", on(B)).unwrap());
    pool.cleanup(qb).unwrap();
    let qc = bound(pool.init_query("primary", on(C)).unwrap());
    pool.cleanup(qc).unwrap();

    assert_eq!(host.resumed(), [B, C, D]);
    assert_eq!(pool.status().waiting, 0);
}

#[test]
fn test_queued_twice_is_one_entry() {
    let (mut pool, _, host) = pool_with(1);

    let _qa = bound(pool.init_query("primary", on(A)).unwrap());
    assert_eq!(pool.init_query("primary", on(B)).unwrap(), Acquire::Queued);
    assert_eq!(pool.init_query("primary", on(B)).unwrap(), Acquire::Queued);

    assert_eq!(pool.status().waiting, 1);
    assert_eq!(host.suspend_count(B), 1);
}

#[test]
fn test_dead_waiter_is_skipped() {
    let (mut pool, _, host) = pool_with(1);

    let qa = bound(pool.init_query("primary", on(A)).unwrap());
    assert_eq!(pool.init_query("primary", on(B)).unwrap(), Acquire::Queued);
    assert_eq!(pool.init_query("primary", on(C)).unwrap(), Acquire::Queued);

    host.kill(B);
    pool.cleanup(qa).unwrap();

    assert_eq!(host.resumed(), [C]);
    assert_eq!(pool.status().waiting, 0);
}

#[test]
fn test_cancel_wait() {
    let (mut pool, _, host) = pool_with(1);

    let qa = bound(pool.init_query("primary", on(A)).unwrap());
    assert_eq!(pool.init_query("primary", on(B)).unwrap(), Acquire::Queued);

    assert!(pool.cancel_wait(B));
    assert!(!pool.cancel_wait(B));

    pool.cleanup(qa).unwrap();
    assert!(host.resumed().is_empty());
}

#[test]
fn test_teardown_discards_wait_entry_and_queries() {
    let (mut pool, driver, host) = pool_with(1);

    let qa = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(qa, "SELECT 1").unwrap();
    assert_eq!(pool.init_query("primary", on(B)).unwrap(), Acquire::Queued);

    host.kill(B);
    pool.teardown_caller(B);
    assert_eq!(pool.status().waiting, 0);

    host.kill(A);
    pool.teardown_caller(A);
    assert!(pool.query(qa).is_none());
    assert!(host.watched().is_empty());
    // The reply to A's statement never arrived, so the connection is closed.
    assert_eq!(pool.status().total, 0);
    assert_eq!(driver.open_connections(), 0);

    assert!(host.resumed().is_empty());
}

/// Replies arrive in the order statements were sent, one per read, and the
/// connection keeps the default `drain`.
#[derive(Debug, Default)]
struct WireDriver {
    next_socket: i32,
}

#[derive(Debug)]
struct WireConnection {
    socket: Socket,
    wire: VecDeque<String>,
    ready: VecDeque<Reply<MockRows>>,
}

impl Driver for WireDriver {
    type Connection = WireConnection;

    fn connect(&mut self, _params: &ConnectParams) -> Result<WireConnection, DriverError> {
        self.next_socket += 1;
        Ok(WireConnection {
            socket: Socket(self.next_socket),
            wire: VecDeque::new(),
            ready: VecDeque::new(),
        })
    }
}

impl Connection for WireConnection {
    type Rows = MockRows;

    fn socket(&self) -> Option<Socket> {
        Some(self.socket)
    }

    fn query(&mut self, sql: &str) -> Result<Option<MockRows>, DriverError> {
        Ok(Some(MockRows::single(sql.to_string())))
    }

    fn query_params(&mut self, sql: &str, _: &[Param], _: Format) -> Result<Option<MockRows>, DriverError> {
        self.query(sql)
    }

    fn send_query(&mut self, sql: &str) -> Result<(), DriverError> {
        self.wire.push_back(sql.to_string());
        Ok(())
    }

    fn send_query_params(&mut self, sql: &str, _: &[Param], _: Format) -> Result<(), DriverError> {
        self.send_query(sql)
    }

    fn consume_input(&mut self) -> Result<(), DriverError> {
        if let Some(sql) = self.wire.pop_front() {
            self.ready.push_back(Reply::Rows(MockRows::single(sql)));
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.ready.is_empty() && !self.wire.is_empty()
    }

    fn next_result(&mut self) -> Option<Reply<MockRows>> {
        self.ready.pop_front()
    }
}

#[test]
fn test_abandoned_reply_never_reaches_next_caller() {
    init_tracing();
    let host = RecordingHost::new();
    let mut pool = PoolBuilder::new()
        .max_connections(1)
        .target("primary", params())
        .build(WireDriver::default(), host.clone())
        .unwrap();

    let qa = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(qa, "SELECT secret FROM a").unwrap();
    let first = pool.query(qa).unwrap().connection().unwrap();
    host.kill(A);
    pool.teardown_caller(A);

    let qb = bound(pool.init_query("primary", on(B)).unwrap());
    pool.submit(qb, "SELECT b").unwrap();
    let conn = pool.query(qb).unwrap().connection().unwrap();
    assert_ne!(conn, first);

    assert_eq!(pool.on_readable(conn), Some(QueryState::Result));
    assert_eq!(pool.query(qb).unwrap().get_value(0, 0).unwrap(), b"SELECT b");
    assert_eq!(pool.status().total, 1);
}

// =============================================================================
// Connection failures
// =============================================================================

#[test]
fn test_lost_connection_fails_waiting_query() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond("SELECT 1", Response::lost("server has gone away"));

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "SELECT 1").unwrap();
    let conn = host.watched_connection().unwrap();

    assert_eq!(pool.on_readable(conn), Some(QueryState::Error));
    let query = pool.query(q).unwrap();
    assert_eq!(query.error(), Some("server has gone away"));
    assert_eq!(query.connection(), None);
    assert_eq!(host.resume_count(A), 1);
    assert!(host.watched().is_empty());
    assert_eq!(pool.status().total, 0);
    assert_eq!(driver.open_connections(), 0);

    pool.cleanup(q).unwrap();
    assert_eq!(state(&pool, q), QueryState::Complete);
}

#[test]
fn test_destroy_wakes_next_waiter() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond("SELECT 1", Response::lost("connection reset by peer"));

    let qa = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(qa, "SELECT 1").unwrap();
    assert_eq!(pool.init_query("primary", on(B)).unwrap(), Acquire::Queued);

    let conn = host.watched_connection().unwrap();
    pool.on_readable(conn);
    assert_eq!(host.resumed(), [A, B]);

    let qb = bound(pool.init_query("primary", on(B)).unwrap());
    assert_ne!(pool.query(qb).unwrap().connection(), Some(conn));
    assert_eq!(driver.connect_count(), 2);
    assert_eq!(pool.status().total, 1);
}

#[test]
fn test_host_error_event() {
    let (mut pool, _, host) = pool_with(1);

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "SELECT 1").unwrap();
    let conn = host.watched_connection().unwrap();

    assert_eq!(pool.handle_event(HostEvent::Error(conn)), Some(QueryState::Error));
    assert_eq!(
        pool.query(q).unwrap().error(),
        Some("socket error reported by event loop")
    );
    assert_eq!(pool.handle_event(HostEvent::Error(conn)), None);
    assert_eq!(host.resume_count(A), 1);
}

#[test]
fn test_destroy_idle_connection() {
    let (mut pool, driver, _) = pool_with(1);

    let q = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    let conn = pool.query(q).unwrap().connection().unwrap();
    pool.cleanup(q).unwrap();

    pool.destroy_connection(conn, DriverError::ConnectionLost("idle timeout".into()));
    assert!(!pool.is_free(conn));
    assert_eq!(pool.status().total, 0);
    assert_eq!(driver.open_connections(), 0);
    assert_eq!(pool.metrics().connections_closed, 1);
}

#[test]
fn test_destroy_after_result_keeps_result() {
    let (mut pool, driver, host) = pool_with(1);
    driver.respond("SELECT 1", Response::rows(MockRows::single("1")));

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "SELECT 1").unwrap();
    let conn = host.watched_connection().unwrap();
    pool.on_readable(conn);

    pool.destroy_connection(conn, DriverError::ConnectionLost("reset".into()));
    let query = pool.query(q).unwrap();
    assert_eq!(query.state(), QueryState::Result);
    assert_eq!(query.row_count(), Ok(1));
    assert_eq!(host.resume_count(A), 1);
}

// =============================================================================
// Shutdown, status and metrics
// =============================================================================

#[test]
fn test_shutdown() {
    let (mut pool, driver, host) = pool_with(2);

    let idle = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    pool.cleanup(idle).unwrap();
    let qa = bound(pool.init_query("primary", on(A)).unwrap());
    let _qc = bound(pool.init_query("primary", on(C)).unwrap());
    assert_eq!(pool.init_query("primary", on(B)).unwrap(), Acquire::Queued);

    pool.shutdown();
    assert!(pool.is_closed());
    assert_eq!(host.resumed(), [B]);
    assert_eq!(pool.init_query("primary", on(B)), Err(PoolError::PoolClosed));

    pool.cleanup(qa).unwrap();
    assert_eq!(pool.status().total, 1);
    assert_eq!(driver.open_connections(), 1);
}

#[test]
fn test_metrics_and_metadata() {
    let (mut pool, driver, host) = pool_with(2);
    driver.respond("SELECT broken", Response::error("boom"));

    let q1 = bound(pool.init_query("primary", QueryMode::Sync).unwrap());
    pool.submit(q1, "SELECT 1").unwrap();
    pool.cleanup(q1).unwrap();

    let q2 = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q2, "SELECT broken").unwrap();
    let conn = host.watched_connection().unwrap();
    pool.on_readable(conn);
    pool.cleanup(q2).unwrap();

    let metrics = pool.metrics();
    assert_eq!(metrics.connections_created, 1);
    assert_eq!(metrics.checkouts_successful, 2);
    assert_eq!(metrics.queries_submitted, 2);
    assert_eq!(metrics.queries_failed, 1);
    assert!((metrics.query_success_rate() - 0.5).abs() < f64::EPSILON);

    let meta: Vec<_> = pool.connections().collect();
    assert_eq!(meta.len(), 1);
    assert_eq!(meta[0].id, conn);
    assert_eq!(meta[0].target, "primary");
    assert_eq!(meta[0].checkouts, 2);
}

#[test]
fn test_host_call_sequence() {
    let (mut pool, _, host) = pool_with(1);

    let q = bound(pool.init_query("primary", on(A)).unwrap());
    pool.submit(q, "SELECT 1").unwrap();
    let conn = host.watched_connection().unwrap();
    let socket = host.watched()[0].0;
    pool.on_readable(conn);

    assert_eq!(
        host.calls(),
        [
            HostCall::Watch(socket, conn),
            HostCall::Suspend(A),
            HostCall::Unwatch(socket),
            HostCall::Resume(A),
        ]
    );
}
