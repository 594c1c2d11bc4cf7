//! # evsql-driver
//!
//! The contract between the evsql connection manager and a database driver.
//!
//! evsql never speaks a wire protocol itself. A driver library (a MySQL or
//! PostgreSQL client binding, or a scripted mock in tests) implements the
//! traits in this crate and the pool drives it:
//!
//! - [`Driver::connect`] opens a blocking connection to a [`ConnectParams`]
//! - [`Connection::query`] runs a statement inline and fetches the full result
//! - [`Connection::send_query`], [`Connection::consume_input`] and
//!   [`Connection::next_result`] form the non-blocking path used when the
//!   host event loop reports the connection's [`Socket`] readable
//! - [`ResultSet`] exposes raw cell bytes; decoding is the caller's business
//!
//! ## Example
//!
//! ```rust,ignore
//! use evsql_driver::{ConnectParams, Driver};
//!
//! let params = ConnectParams::from_connection_string(
//!     "host=db.internal;user=app;password=secret;database=orders;port=3306",
//! )?;
//! let mut conn = driver.connect(&params)?;
//! let rows = conn.query("SELECT id FROM orders")?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connect;
pub mod driver;
pub mod error;
pub mod params;

pub use connect::{ClientFlags, ConnectParams};
pub use driver::{Connection, Driver, Reply, ResultSet, Socket};
pub use error::DriverError;
pub use params::{Format, Param};
