//! FIFO queue of callers waiting for a connection.

use std::collections::VecDeque;

use crate::host::CallerId;

/// A queued caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitEntry {
    /// The waiting caller.
    pub caller: CallerId,
}

/// Callers blocked on connection acquisition, oldest first.
///
/// A caller appears at most once.
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: VecDeque<WaitEntry>,
}

impl WaitQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `caller`. Returns `false` if it was already queued.
    pub fn enqueue(&mut self, caller: CallerId) -> bool {
        if self.contains(caller) {
            return false;
        }
        self.entries.push_back(WaitEntry { caller });
        true
    }

    /// Pop the oldest caller for which `alive` holds.
    ///
    /// Entries failing `alive` are discarded on the way.
    pub fn drain_one(&mut self, mut alive: impl FnMut(CallerId) -> bool) -> Option<CallerId> {
        while let Some(entry) = self.entries.pop_front() {
            if alive(entry.caller) {
                return Some(entry.caller);
            }
            tracing::trace!(caller = %entry.caller, "discarding wait entry of torn-down caller");
        }
        None
    }

    /// Remove `caller`'s entry. Returns whether one was removed.
    pub fn remove(&mut self, caller: CallerId) -> bool {
        match self.entries.iter().position(|e| e.caller == caller) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Whether `caller` is queued.
    #[must_use]
    pub fn contains(&self, caller: CallerId) -> bool {
        self.entries.iter().any(|e| e.caller == caller)
    }

    /// Number of queued callers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &WaitEntry> {
        self.entries.iter()
    }
}
