//! # evsql-testing
//!
//! Test infrastructure for the evsql connection manager.
//!
//! - [`MockDriver`] replays scripted replies, one step per readiness event
//! - [`RecordingHost`] records suspend, resume and socket-watch requests
//! - [`MockRows`] builds result sets by hand
//!
//! Pool scenario and property tests live in this crate's `tests/`
//! directory, since `evsql-pool` cannot dev-depend on a crate that depends
//! on it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use evsql_testing::{MockDriver, MockRows, RecordingHost, Response};
//!
//! let driver = MockDriver::new();
//! driver.respond("SELECT 1", Response::rows(MockRows::single("1")).after_pending(1));
//! let host = RecordingHost::new();
//!
//! let mut pool = PoolBuilder::new()
//!     .target("primary", ConnectParams::new().host("mock"))
//!     .build(driver.clone(), host.clone())?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod driver;
pub mod host;
pub mod rows;

pub use driver::{FIRST_SOCKET, MockConnection, MockDriver, Response, Step};
pub use host::{HostCall, RecordingHost};
pub use rows::MockRows;

/// A pool over the mock driver and the recording host.
pub type MockPool = evsql_pool::Pool<MockDriver, RecordingHost>;

/// Install a test log subscriber honouring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
