//! A host that records what the pool asks of it.

use std::sync::Arc;

use evsql_driver::Socket;
use evsql_pool::{CallerId, ConnectionId, EventLoop, Scheduler};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;

/// One request from the pool to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    /// A caller was parked.
    Suspend(CallerId),
    /// A caller was made runnable.
    Resume(CallerId),
    /// Read interest was registered.
    Watch(Socket, ConnectionId),
    /// Read interest was dropped.
    Unwatch(Socket),
}

#[derive(Debug, Default)]
struct HostLog {
    calls: Vec<HostCall>,
    dead: HashSet<CallerId>,
    watched: HashMap<Socket, ConnectionId>,
}

/// Records every scheduler and event-loop call.
///
/// Clones share the log, so a test can hand one clone to the pool and
/// inspect another.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    log: Arc<Mutex<HostLog>>,
}

impl RecordingHost {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.log.lock().calls.clone()
    }

    /// Resumed callers, in order.
    #[must_use]
    pub fn resumed(&self) -> Vec<CallerId> {
        self.log
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                HostCall::Resume(caller) => Some(*caller),
                _ => None,
            })
            .collect()
    }

    /// How many times `caller` was resumed.
    #[must_use]
    pub fn resume_count(&self, caller: CallerId) -> usize {
        self.count(HostCall::Resume(caller))
    }

    /// How many times `caller` was suspended.
    #[must_use]
    pub fn suspend_count(&self, caller: CallerId) -> usize {
        self.count(HostCall::Suspend(caller))
    }

    /// Sockets currently watched and the connections they report for.
    #[must_use]
    pub fn watched(&self) -> Vec<(Socket, ConnectionId)> {
        let mut watched: Vec<_> = self.log.lock().watched.iter().map(|(s, c)| (*s, *c)).collect();
        watched.sort();
        watched
    }

    /// The connection registered for readiness, if exactly one is.
    #[must_use]
    pub fn watched_connection(&self) -> Option<ConnectionId> {
        let log = self.log.lock();
        if log.watched.len() == 1 {
            log.watched.values().next().copied()
        } else {
            None
        }
    }

    /// Mark `caller` as torn down.
    pub fn kill(&self, caller: CallerId) {
        self.log.lock().dead.insert(caller);
    }

    /// Forget recorded calls. Liveness and watches are kept.
    pub fn clear(&self) {
        self.log.lock().calls.clear();
    }

    fn count(&self, wanted: HostCall) -> usize {
        self.log.lock().calls.iter().filter(|call| **call == wanted).count()
    }
}

impl Scheduler for RecordingHost {
    fn suspend(&mut self, caller: CallerId) {
        self.log.lock().calls.push(HostCall::Suspend(caller));
    }

    fn resume(&mut self, caller: CallerId) {
        self.log.lock().calls.push(HostCall::Resume(caller));
    }

    fn is_alive(&self, caller: CallerId) -> bool {
        !self.log.lock().dead.contains(&caller)
    }
}

impl EventLoop for RecordingHost {
    fn watch_readable(&mut self, socket: Socket, connection: ConnectionId) {
        let mut log = self.log.lock();
        log.calls.push(HostCall::Watch(socket, connection));
        log.watched.insert(socket, connection);
    }

    fn unwatch(&mut self, socket: Socket) {
        let mut log = self.log.lock();
        log.calls.push(HostCall::Unwatch(socket));
        log.watched.remove(&socket);
    }
}
