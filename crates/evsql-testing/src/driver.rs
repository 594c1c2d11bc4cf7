//! Scripted mock driver.
//!
//! Each SQL text maps to a [`Response`]: a sequence of [`Step`]s consumed one
//! per readiness event. Unscripted statements complete with no rows on the
//! first readiness event.
//!
//! [`MockDriver`] is cheaply clonable; clones share the script and the
//! counters, so a test keeps one clone while the pool owns the other.

use std::collections::VecDeque;
use std::sync::Arc;

use evsql_driver::{ConnectParams, Connection, Driver, DriverError, Format, Param, Reply, Socket};
use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::rows::MockRows;

/// First socket number handed out.
pub const FIRST_SOCKET: i32 = 100;

/// One readiness event's worth of driver behaviour.
#[derive(Debug, Clone)]
pub enum Step {
    /// Data arrived but the reply is incomplete.
    Pending,
    /// A result set.
    Rows(MockRows),
    /// Completed without rows.
    CommandOk,
    /// The server rejected the statement.
    ServerError(String),
    /// A reply the pool ignores (copy stream, notice).
    Notice,
    /// Reading failed; the connection is still usable.
    ReadError(String),
    /// The connection dropped.
    Lost(String),
}

/// Scripted behaviour of one statement.
#[derive(Debug, Clone)]
pub struct Response {
    steps: Vec<Step>,
    send_error: Option<DriverError>,
}

impl Response {
    /// Complete with a result set.
    #[must_use]
    pub fn rows(rows: MockRows) -> Self {
        Self::steps([Step::Rows(rows)])
    }

    /// Complete without rows.
    #[must_use]
    pub fn command_ok() -> Self {
        Self::steps([Step::CommandOk])
    }

    /// Fail with a server error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::steps([Step::ServerError(message.into())])
    }

    /// Drop the connection while reading.
    #[must_use]
    pub fn lost(message: impl Into<String>) -> Self {
        Self::steps([Step::Lost(message.into())])
    }

    /// An explicit step sequence.
    #[must_use]
    pub fn steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            send_error: None,
        }
    }

    /// Fail when the statement is sent.
    #[must_use]
    pub fn send_fails(error: DriverError) -> Self {
        Self {
            steps: Vec::new(),
            send_error: Some(error),
        }
    }

    /// Report `count` incomplete reads before the scripted steps.
    #[must_use]
    pub fn after_pending(mut self, count: usize) -> Self {
        let mut steps = vec![Step::Pending; count];
        steps.append(&mut self.steps);
        self.steps = steps;
        self
    }

    /// Queue another step after the scripted ones.
    #[must_use]
    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

#[derive(Debug, Default)]
struct Shared {
    scripts: HashMap<String, Response>,
    connect_failures: VecDeque<String>,
    sockets: VecDeque<i32>,
    next_socket: i32,
    connects: usize,
    open: usize,
    statements: Vec<String>,
    drained: usize,
}

impl Shared {
    fn response(&self, sql: &str) -> Response {
        self.scripts
            .get(sql)
            .cloned()
            .unwrap_or_else(Response::command_ok)
    }
}

/// A driver that replays scripted responses.
#[derive(Debug, Clone)]
pub struct MockDriver {
    shared: Arc<Mutex<Shared>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// A driver with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                next_socket: FIRST_SOCKET,
                ..Shared::default()
            })),
        }
    }

    /// Script the response to `sql`.
    pub fn respond(&self, sql: impl Into<String>, response: Response) -> &Self {
        self.shared.lock().scripts.insert(sql.into(), response);
        self
    }

    /// Make the next connect attempt fail with `message`.
    pub fn fail_next_connect(&self, message: impl Into<String>) -> &Self {
        self.shared.lock().connect_failures.push_back(message.into());
        self
    }

    /// Hand out these socket numbers to the next connections, in order.
    pub fn use_sockets(&self, sockets: impl IntoIterator<Item = i32>) -> &Self {
        self.shared.lock().sockets.extend(sockets);
        self
    }

    /// Connect attempts, successful or not.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.shared.lock().connects
    }

    /// Connections opened and not yet dropped.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.shared.lock().open
    }

    /// Every statement sent, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.shared.lock().statements.clone()
    }

    /// Replies discarded by connection drains.
    #[must_use]
    pub fn drained(&self) -> usize {
        self.shared.lock().drained
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;

    fn connect(&mut self, params: &ConnectParams) -> Result<MockConnection, DriverError> {
        let mut shared = self.shared.lock();
        shared.connects += 1;

        if let Some(message) = shared.connect_failures.pop_front() {
            tracing::debug!(host = %params.host, "mock connect failing");
            return Err(DriverError::Connect(message));
        }

        let fd = match shared.sockets.pop_front() {
            Some(fd) => fd,
            None => {
                let fd = shared.next_socket;
                shared.next_socket += 1;
                fd
            }
        };
        shared.open += 1;

        Ok(MockConnection {
            socket: Socket(fd),
            shared: Arc::clone(&self.shared),
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            busy: false,
            last_error: None,
        })
    }
}

/// A connection produced by [`MockDriver`].
#[derive(Debug)]
pub struct MockConnection {
    socket: Socket,
    shared: Arc<Mutex<Shared>>,
    pending: VecDeque<Step>,
    ready: VecDeque<Reply<MockRows>>,
    busy: bool,
    last_error: Option<String>,
}

impl MockConnection {
    fn start(&mut self, sql: &str) -> Result<Response, DriverError> {
        let response = {
            let mut shared = self.shared.lock();
            shared.statements.push(sql.to_string());
            shared.response(sql)
        };
        match &response.send_error {
            Some(err) => {
                if err.is_connection_fatal() {
                    self.last_error = Some(err.message().to_string());
                }
                Err(err.clone())
            }
            None => Ok(response),
        }
    }

    fn run_inline(&mut self, sql: &str) -> Result<Option<MockRows>, DriverError> {
        let response = self.start(sql)?;
        let outcome = response.steps.into_iter().find(|s| !matches!(s, Step::Pending));
        match outcome {
            None | Some(Step::CommandOk | Step::Notice) => Ok(None),
            Some(Step::Rows(rows)) => Ok(Some(rows)),
            Some(Step::ServerError(message) | Step::ReadError(message)) => Err(DriverError::Query(message)),
            Some(Step::Lost(message)) => {
                self.last_error = Some(message.clone());
                Err(DriverError::ConnectionLost(message))
            }
            Some(Step::Pending) => Ok(None),
        }
    }

    fn dispatch(&mut self, sql: &str) -> Result<(), DriverError> {
        let response = self.start(sql)?;
        self.pending = response.steps.into();
        self.ready.clear();
        self.busy = true;
        Ok(())
    }
}

fn into_reply(step: Step) -> Option<Reply<MockRows>> {
    match step {
        Step::Rows(rows) => Some(Reply::Rows(rows)),
        Step::CommandOk => Some(Reply::CommandOk),
        Step::ServerError(message) => Some(Reply::Error(message)),
        Step::Notice => Some(Reply::Other),
        Step::Pending | Step::ReadError(_) | Step::Lost(_) => None,
    }
}

impl Connection for MockConnection {
    type Rows = MockRows;

    fn socket(&self) -> Option<Socket> {
        Some(self.socket)
    }

    fn query(&mut self, sql: &str) -> Result<Option<MockRows>, DriverError> {
        self.run_inline(sql)
    }

    fn query_params(
        &mut self,
        sql: &str,
        _params: &[Param],
        _format: Format,
    ) -> Result<Option<MockRows>, DriverError> {
        self.run_inline(sql)
    }

    fn send_query(&mut self, sql: &str) -> Result<(), DriverError> {
        self.dispatch(sql)
    }

    fn send_query_params(&mut self, sql: &str, _params: &[Param], _format: Format) -> Result<(), DriverError> {
        self.dispatch(sql)
    }

    fn consume_input(&mut self) -> Result<(), DriverError> {
        match self.pending.pop_front() {
            None => self.busy = false,
            Some(Step::Pending) => self.busy = true,
            Some(Step::ReadError(message)) => {
                self.busy = false;
                return Err(DriverError::Query(message));
            }
            Some(Step::Lost(message)) => {
                self.last_error = Some(message.clone());
                return Err(DriverError::ConnectionLost(message));
            }
            Some(step) => {
                self.busy = false;
                self.ready.extend(into_reply(step));
                // Replies that follow without an intervening incomplete read
                // are already buffered.
                while let Some(next) = self.pending.front() {
                    if matches!(next, Step::Pending | Step::ReadError(_) | Step::Lost(_)) {
                        break;
                    }
                    if let Some(step) = self.pending.pop_front() {
                        self.ready.extend(into_reply(step));
                    }
                }
            }
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.busy
    }

    fn next_result(&mut self) -> Option<Reply<MockRows>> {
        self.ready.pop_front()
    }

    fn error_message(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn drain(&mut self) -> usize {
        // Steps not yet read stay scripted, like bytes still on the wire.
        let dropped = self.ready.len();
        self.ready.clear();
        self.shared.lock().drained += dropped;
        dropped
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        shared.open = shared.open.saturating_sub(1);
    }
}
