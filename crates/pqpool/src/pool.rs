//! Connection pooling for database connections
//!
//! The pool keeps a FIFO of idle connections plus two counters: the number
//! of connections it has open and how many of those were opened above
//! `max_size` to absorb a burst. All of it lives behind one mutex.
//!
//! # Example
//!
//! ```ignore
//! use pqpool::{ConnectionPool, PoolConfig};
//! use pqpool_postgres::PostgresConnector;
//!
//! let config = PoolConfig::new(2, 5).with_reap_interval_ms(20_000);
//! let pool = ConnectionPool::new("host=localhost dbname=app", config, PostgresConnector).await;
//!
//! let lease = pool.acquire().await?;
//! let result = lease.execute("SELECT 1").await;
//! // Connection returned to the pool on drop
//! ```

mod config;
mod lease;
mod pool;
mod reaper;
mod state;
mod stats;


pub use config::{
    DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE, DEFAULT_REAP_INTERVAL_MS, FALLBACK_MAX_SIZE,
    FALLBACK_MIN_SIZE, OverheadPolicy, PoolConfig,
};
pub use lease::Lease;
pub use pool::ConnectionPool;
pub use stats::PoolStats;
