//! # evsql-pool
//!
//! Database connection manager for single-threaded, event-driven servers.
//!
//! Many request handlers share a small, bounded set of database connections.
//! A handler issues a query without blocking the event loop: it is suspended
//! while the database works and resumed once the result, an error or
//! completion is available.
//!
//! ## Features
//!
//! - Named database targets, looked up by name or by credentials
//! - Bounded pool with lazy connection creation (default cap of 2)
//! - FIFO wait queue when every connection is in use
//! - Explicit per-query state machine (INIT, WAIT, RESULT, ERROR, DONE, COMPLETE)
//! - Suspend/resume bridge that wakes each waiting caller exactly once
//! - Sync mode for startup and admin paths
//! - Pool status and metrics
//!
//! The pool is host-agnostic. A server plugs in its scheduler and event loop
//! through the [`Host`] trait and any database client through the
//! `evsql-driver` traits.
//!
//! ## Example
//!
//! ```rust,ignore
//! use evsql_pool::{Acquire, HostEvent, PoolBuilder, QueryMode, QueryState};
//!
//! let mut pool = PoolBuilder::new()
//!     .max_connections(2)
//!     .target("primary", ConnectParams::from_connection_string(
//!         "host=127.0.0.1;user=app;password=secret;database=shop",
//!     )?)
//!     .build(driver, host)?;
//!
//! let Acquire::Bound(query) = pool.init_query("primary", QueryMode::Async { caller })? else {
//!     return Ok(()); // queued; retry when resumed
//! };
//! pool.submit(query, "SELECT id, name FROM users")?;
//!
//! // Later, from the event loop:
//! pool.handle_event(HostEvent::Readable(connection));
//!
//! // When the caller is resumed:
//! let q = pool.query(query).expect("query handle");
//! if q.state() == QueryState::Result {
//!     for row in 0..q.row_count()? {
//!         let name = q.get_value(row, 1)?;
//!     }
//! }
//! pool.cleanup(query)?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod instrumentation;
pub mod lifecycle;
pub mod pool;
pub mod query;
pub mod registry;
pub mod state;
pub mod wait_queue;

// Configuration
pub use config::{DEFAULT_MAX_CONNECTIONS, PoolConfig};

// Error types
pub use error::{PoolError, Result};

// Host integration
pub use bridge::SuspensionBridge;
pub use host::{CallerId, ConnectionId, EventLoop, Host, HostEvent, Scheduler};

// Pool types
pub use pool::{Acquire, Pool, PoolBuilder, PoolMetrics, PoolStatus, RowsOf};

// Queries
pub use query::{Query, QueryId};
pub use state::{QueryMode, QueryState};

// Targets
pub use registry::{LogicalTarget, Registry, TargetSelector};

// Waiting
pub use wait_queue::{WaitEntry, WaitQueue};

// Instrumentation
pub use instrumentation::SanitizationConfig;
pub use lifecycle::ConnectionMetadata;

pub use evsql_driver::{ConnectParams, DriverError, Format, Param};
