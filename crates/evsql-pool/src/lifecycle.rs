//! Per-connection bookkeeping.

use std::time::{Duration, Instant};

use crate::host::ConnectionId;

/// Metadata tracked for every live connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Connection identity.
    pub id: ConnectionId,
    /// Name of the target the connection belongs to.
    pub target: String,
    /// When the connection was opened.
    pub created_at: Instant,
    /// When the connection was last handed to a query.
    pub last_checkout: Instant,
    /// How many queries have used the connection.
    pub checkouts: u64,
}

impl ConnectionMetadata {
    pub(crate) fn new(id: ConnectionId, target: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            target: target.into(),
            created_at: now,
            last_checkout: now,
            checkouts: 0,
        }
    }

    pub(crate) fn record_checkout(&mut self) {
        self.last_checkout = Instant::now();
        self.checkouts += 1;
    }

    /// Time since the connection was opened.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the connection was last checked out.
    #[must_use]
    pub fn since_checkout(&self) -> Duration {
        self.last_checkout.elapsed()
    }
}
