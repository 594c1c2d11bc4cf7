//! Query states and the transition table.
//!
//! ```text
//!            submit (async)            on_readable
//!   INIT ─────────────────▶ WAIT ───────────────────▶ RESULT | ERROR | DONE
//!    │ submit (sync)                                         │
//!    └──────────────────────────────▶ DONE | ERROR           │ cleanup
//!                                                            ▼
//!   INIT ◀──────────── reacquire ───────────────────────  COMPLETE
//! ```
//!
//! `cleanup` reaches COMPLETE from every state.

use std::fmt;

use crate::host::CallerId;

/// Lifecycle state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryState {
    /// A connection is bound, nothing submitted yet.
    Init,
    /// Submitted asynchronously, waiting for the driver.
    Wait,
    /// A result set is available.
    Result,
    /// The query failed; the error text is available.
    Error,
    /// The query finished.
    Done,
    /// The connection went back to the pool.
    Complete,
}

impl QueryState {
    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: QueryState) -> bool {
        use QueryState::*;
        matches!(
            (self, next),
            (Init, Wait | Done | Error)
                | (Wait, Result | Error | Done)
                | (Init | Wait | Result | Error | Done, Complete)
                | (Complete, Init)
        )
    }

    /// Whether the edge `self -> next` wakes the query's caller.
    ///
    /// Only leaving WAIT resumes a caller.
    #[must_use]
    pub fn resumes_caller(self, next: QueryState) -> bool {
        self == QueryState::Wait && matches!(next, QueryState::Result | QueryState::Error | QueryState::Done)
    }

    /// Whether the caller can act on the query (read results or the error).
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, QueryState::Result | QueryState::Error | QueryState::Done)
    }

    /// Upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueryState::Init => "INIT",
            QueryState::Wait => "WAIT",
            QueryState::Result => "RESULT",
            QueryState::Error => "ERROR",
            QueryState::Done => "DONE",
            QueryState::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a query is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Run inline, blocking the event loop. For startup and admin paths.
    Sync,
    /// Run through the event loop; `caller` is suspended while waiting.
    Async {
        /// The caller to suspend and resume.
        caller: CallerId,
    },
}

impl QueryMode {
    /// The caller of an async query.
    #[must_use]
    pub fn caller(self) -> Option<CallerId> {
        match self {
            QueryMode::Sync => None,
            QueryMode::Async { caller } => Some(caller),
        }
    }

    /// Whether this is [`QueryMode::Async`].
    #[must_use]
    pub fn is_async(self) -> bool {
        matches!(self, QueryMode::Async { .. })
    }
}
