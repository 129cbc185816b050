//! Error types for pqpool

use thiserror::Error;

/// Error taxonomy for pool and connection operations
#[derive(Error, Debug)]
pub enum PoolError {
    /// Bad pool sizing. Recovered locally with fallback defaults and only logged.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The connector failed to open a connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement or transaction failed on an open connection.
    #[error("Query error: {0}")]
    Query(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// The pool has been torn down.
    #[error("Pool is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl PoolError {
    /// Whether the error came from opening (or re-opening) a connection
    pub fn is_connection_error(&self) -> bool {
        matches!(self, PoolError::Connection(_) | PoolError::Timeout(_))
    }
}

/// Result type alias for pqpool operations
pub type Result<T> = std::result::Result<T, PoolError>;
