//! Contracts with the host server.
//!
//! The pool does not own an event loop or a task scheduler. The host
//! provides both through [`Scheduler`] and [`EventLoop`] and feeds
//! readiness back to the pool as [`HostEvent`]s.

use std::fmt;

use evsql_driver::Socket;

/// Identity of a request-handling unit that can be suspended and resumed.
///
/// Assigned by the host; the pool only compares and stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerId(pub u64);

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "caller#{}", self.0)
    }
}

/// Identity of a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Cooperative task primitives of the host.
pub trait Scheduler {
    /// Park `caller`. Must not block the event loop.
    fn suspend(&mut self, caller: CallerId);

    /// Make `caller` runnable again.
    fn resume(&mut self, caller: CallerId);

    /// Whether `caller` still exists. Torn-down callers are never resumed.
    fn is_alive(&self, caller: CallerId) -> bool {
        let _ = caller;
        true
    }
}

/// Read-readiness registration with the host event loop.
pub trait EventLoop {
    /// Deliver [`HostEvent::Readable`] for `connection` whenever `socket`
    /// becomes readable, and [`HostEvent::Error`] if it faults.
    fn watch_readable(&mut self, socket: Socket, connection: ConnectionId);

    /// Stop watching `socket`.
    fn unwatch(&mut self, socket: Socket);
}

/// Everything the pool needs from its host.
pub trait Host: Scheduler + EventLoop {}

impl<T: Scheduler + EventLoop> Host for T {}

/// A readiness notification from the host event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The connection's socket has data to read.
    Readable(ConnectionId),
    /// The connection's socket reported an error or hang-up.
    Error(ConnectionId),
}

impl HostEvent {
    /// The connection the event is about.
    #[must_use]
    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::Readable(id) | Self::Error(id) => *id,
        }
    }
}
