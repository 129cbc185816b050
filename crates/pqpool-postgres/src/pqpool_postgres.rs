//! PostgreSQL implementation of the pqpool connection collaborator

mod connection;
mod connector;
mod value;

pub use connection::{PostgresConnection, PostgresTransaction};
pub use connector::{PostgresConnector, host_from_connection_string};
