//! pqpool core - shared abstractions for the connection pool
//!
//! This crate defines the collaborator surface the pool is built against:
//!
//! - `Connector` - opens a connection from a connection string
//! - `Connection` - an open database connection that can be closed and probed
//! - `Transaction` - begin/exec/commit/rollback on a connection
//! - Common types like `Value`, `Row`, `QueryResult` and the `PoolError` taxonomy

mod connection;
mod error;
mod types;

pub use connection::*;
pub use error::*;
pub use types::*;
