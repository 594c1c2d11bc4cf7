//! Caller suspension bridge.
//!
//! Every suspend the pool issues is recorded here, and a resume is only
//! forwarded to the host for a caller that is currently recorded as parked.
//! The record is removed on resume, so a second resume for the same
//! suspension is swallowed, and a caller parked by the pool is always
//! resumed by the pool or explicitly forgotten on teardown.

use hashbrown::HashSet;

use crate::host::{CallerId, Scheduler};

/// Tracks which callers the pool has parked.
#[derive(Debug, Default)]
pub struct SuspensionBridge {
    parked: HashSet<CallerId>,
}

impl SuspensionBridge {
    /// Create an empty bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `caller` on the host unless it is already parked.
    ///
    /// Returns `true` if a suspend was issued.
    pub fn suspend<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S, caller: CallerId) -> bool {
        if !self.parked.insert(caller) {
            tracing::trace!(%caller, "caller already suspended");
            return false;
        }
        tracing::trace!(%caller, "suspending caller");
        scheduler.suspend(caller);
        true
    }

    /// Resume `caller` if the pool parked it and it is still alive.
    ///
    /// Returns `true` if a resume was issued.
    pub fn resume<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S, caller: CallerId) -> bool {
        if !self.parked.remove(&caller) {
            tracing::trace!(%caller, "resume ignored, caller is not suspended");
            return false;
        }
        if !scheduler.is_alive(caller) {
            tracing::debug!(%caller, "not resuming torn-down caller");
            return false;
        }
        tracing::trace!(%caller, "resuming caller");
        scheduler.resume(caller);
        true
    }

    /// Drop any record of `caller` without resuming it.
    pub fn forget(&mut self, caller: CallerId) -> bool {
        self.parked.remove(&caller)
    }

    /// Whether `caller` is currently parked by the pool.
    #[must_use]
    pub fn is_suspended(&self, caller: CallerId) -> bool {
        self.parked.contains(&caller)
    }

    /// Number of parked callers.
    #[must_use]
    pub fn suspended_count(&self) -> usize {
        self.parked.len()
    }
}
