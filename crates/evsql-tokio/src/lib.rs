//! # evsql-tokio
//!
//! Runs an evsql [`Pool`](evsql_pool::Pool) on a single-threaded tokio
//! `LocalSet`: caller tasks park on a [`Notify`](tokio::sync::Notify),
//! sockets are watched with [`AsyncFd`](tokio::io::unix::AsyncFd), and a
//! dispatcher task feeds readiness back to the pool.
//!
//! Unix only.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use evsql_pool::PoolBuilder;
//! use evsql_tokio::{Session, TokioHost, dispatch};
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let (host, events) = TokioHost::new();
//!     let pool = Rc::new(RefCell::new(
//!         PoolBuilder::new()
//!             .target("primary", params)
//!             .build(driver, host.clone())?,
//!     ));
//!     tokio::task::spawn_local(dispatch(Rc::clone(&pool), events));
//!
//!     let session = Session::new(&pool, &host);
//!     let query = session.acquire("primary").await?;
//!     session.execute(query, "SELECT id FROM users").await?;
//!     let rows = pool.borrow().query(query).map(|q| q.row_count());
//!     session.finish(query)?;
//!     Ok::<_, evsql_pool::PoolError>(())
//! }).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod host;
pub mod session;

pub use host::{Dispatch, TokioHost};
pub use session::{LocalPool, Session};

use evsql_driver::Driver;
use tokio::sync::mpsc;

/// Feed readiness events and deferred teardowns to the pool until every
/// sender is gone.
pub async fn dispatch<D: Driver>(pool: LocalPool<D>, mut events: mpsc::UnboundedReceiver<Dispatch>) {
    while let Some(work) = events.recv().await {
        match work {
            Dispatch::Event(event) => {
                let state = pool.borrow_mut().handle_event(event);
                tracing::trace!(connection_id = %event.connection(), ?state, "readiness dispatched");
            }
            Dispatch::Teardown(caller) => {
                pool.borrow_mut().teardown_caller(caller);
                tracing::debug!(%caller, "deferred teardown done");
            }
        }
    }
    tracing::debug!("readiness dispatcher stopped");
}
