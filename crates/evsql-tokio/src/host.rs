//! [`Host`](evsql_pool::Host) implementation on a tokio `LocalSet`.

use std::cell::RefCell;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;

use evsql_driver::Socket;
use evsql_pool::{CallerId, ConnectionId, EventLoop, HostEvent, Scheduler};
use hashbrown::{HashMap, HashSet};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

/// How often a watcher retries registering a descriptor that is still
/// registered by the watcher it replaces.
const REGISTER_ATTEMPTS: usize = 8;

/// A descriptor owned by a driver connection. Never closed here.
#[derive(Debug, Clone, Copy)]
struct BorrowedSocket(RawFd);

impl AsRawFd for BorrowedSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// Work for the [`dispatch`](crate::dispatch) task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Readiness or a fault on a watched socket.
    Event(HostEvent),
    /// A caller whose session was dropped while the pool was borrowed.
    Teardown(CallerId),
}

#[derive(Debug, Default)]
struct HostState {
    next_caller: u64,
    live: HashSet<CallerId>,
    parked: HashMap<CallerId, Rc<Notify>>,
    watches: HashMap<Socket, JoinHandle<()>>,
}

/// Scheduler and event loop for a pool living on a tokio `LocalSet`.
///
/// Callers are tasks. Suspending a caller means the task awaits
/// [`TokioHost::park`]; resuming stores a wake-up permit, so a resume that
/// races ahead of the `park` is not lost. Watched sockets get a local task
/// each that forwards readiness as [`HostEvent`]s.
///
/// Clones share state; keep one clone outside the pool for parking.
#[derive(Debug, Clone)]
pub struct TokioHost {
    state: Rc<RefCell<HostState>>,
    events: mpsc::UnboundedSender<Dispatch>,
}

impl TokioHost {
    /// Create a host and the receiver its dispatcher work arrives on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Dispatch>) {
        let (events, rx) = mpsc::unbounded_channel();
        let host = Self {
            state: Rc::new(RefCell::new(HostState {
                next_caller: 1,
                ..HostState::default()
            })),
            events,
        };
        (host, rx)
    }

    /// Allocate an identity for a new caller task.
    pub fn register_caller(&self) -> CallerId {
        let mut state = self.state.borrow_mut();
        let caller = CallerId(state.next_caller);
        state.next_caller += 1;
        state.live.insert(caller);
        caller
    }

    /// Wait until `caller` is resumed.
    pub async fn park(&self, caller: CallerId) {
        let notify = self.notify_for(caller);
        tracing::trace!(%caller, "caller parked");
        notify.notified().await;
    }

    /// Mark `caller` as gone. It will never be resumed.
    pub fn tear_down(&self, caller: CallerId) {
        let mut state = self.state.borrow_mut();
        state.parked.remove(&caller);
        state.live.remove(&caller);
    }

    /// Ask the dispatcher to run [`Pool::teardown_caller`] for `caller`.
    ///
    /// For sessions dropped while the pool is borrowed.
    ///
    /// [`Pool::teardown_caller`]: evsql_pool::Pool::teardown_caller
    pub fn defer_teardown(&self, caller: CallerId) {
        if self.events.send(Dispatch::Teardown(caller)).is_err() {
            tracing::warn!(%caller, "dispatcher gone, caller not torn down");
        }
    }

    /// Number of callers registered and not torn down.
    #[must_use]
    pub fn live_callers(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Number of sockets currently watched.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.state.borrow().watches.len()
    }

    fn notify_for(&self, caller: CallerId) -> Rc<Notify> {
        let mut state = self.state.borrow_mut();
        Rc::clone(state.parked.entry(caller).or_default())
    }
}

impl Scheduler for TokioHost {
    fn suspend(&mut self, caller: CallerId) {
        // The caller parks itself; make sure its permit slot exists.
        drop(self.notify_for(caller));
    }

    fn resume(&mut self, caller: CallerId) {
        let notify = self.state.borrow().parked.get(&caller).cloned();
        match notify {
            Some(notify) => notify.notify_one(),
            None => tracing::debug!(%caller, "resume for caller that never parked"),
        }
    }

    fn is_alive(&self, caller: CallerId) -> bool {
        self.state.borrow().live.contains(&caller)
    }
}

impl EventLoop for TokioHost {
    fn watch_readable(&mut self, socket: Socket, connection: ConnectionId) {
        let events = self.events.clone();
        let task = tokio::task::spawn_local(watch(socket, connection, events));
        if let Some(previous) = self.state.borrow_mut().watches.insert(socket, task) {
            previous.abort();
        }
        tracing::trace!(%socket, connection_id = %connection, "watching socket");
    }

    fn unwatch(&mut self, socket: Socket) {
        if let Some(task) = self.state.borrow_mut().watches.remove(&socket) {
            task.abort();
            tracing::trace!(%socket, "stopped watching socket");
        }
    }
}

async fn register(socket: Socket) -> io::Result<AsyncFd<BorrowedSocket>> {
    let mut fd = BorrowedSocket(socket.as_raw());
    let mut attempt = 0;
    loop {
        match AsyncFd::try_with_interest(fd, Interest::READABLE) {
            Ok(registered) => return Ok(registered),
            Err(err) => {
                let (returned, err) = err.into_parts();
                // The aborted watcher of a reused descriptor has not been dropped yet.
                if err.kind() != io::ErrorKind::AlreadyExists || attempt >= REGISTER_ATTEMPTS {
                    return Err(err);
                }
                fd = returned;
                attempt += 1;
                tokio::task::yield_now().await;
            }
        }
    }
}

async fn watch(socket: Socket, connection: ConnectionId, events: mpsc::UnboundedSender<Dispatch>) {
    let registered = match register(socket).await {
        Ok(registered) => registered,
        Err(err) => {
            tracing::warn!(%socket, connection_id = %connection, error = %err, "cannot watch socket");
            let _ = events.send(Dispatch::Event(HostEvent::Error(connection)));
            return;
        }
    };

    loop {
        match registered.readable().await {
            Ok(mut guard) => {
                guard.clear_ready();
                if events.send(Dispatch::Event(HostEvent::Readable(connection))).is_err() {
                    return;
                }
            }
            Err(err) => {
                tracing::warn!(%socket, connection_id = %connection, error = %err, "socket fault");
                let _ = events.send(Dispatch::Event(HostEvent::Error(connection)));
                return;
            }
        }
    }
}
