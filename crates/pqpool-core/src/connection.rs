//! Connection, transaction and connector traits

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A database connection
///
/// Handles are owned by exactly one party at a time: the pool's idle set
/// or a single lease.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "postgresql")
    fn driver_name(&self) -> &str;

    /// Host this connection talks to, if known
    fn host(&self) -> Option<&str> {
        None
    }

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Begin a transaction
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Check if the connection is still usable
    fn is_open(&self) -> bool {
        !self.is_closed()
    }
}

/// A database transaction
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;

    /// Execute a query within the transaction
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Execute a statement within the transaction
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;
}

/// Opens new connections for a pool
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection to `connection_string`
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>>;

    /// Host named by `connection_string`, used when reporting on a pool
    fn target_host(&self, _connection_string: &str) -> Option<String> {
        None
    }
}

#[async_trait]
impl<T: Connector> Connector for Arc<T> {
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        (**self).open(connection_string).await
    }

    fn target_host(&self, connection_string: &str) -> Option<String> {
        (**self).target_host(connection_string)
    }
}
