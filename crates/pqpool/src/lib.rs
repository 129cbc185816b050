//! pqpool - a bounded pool of reusable database connections
//!
//! Callers lease connections with [`ConnectionPool::acquire`]. Idle
//! connections are reused oldest-first, bursts above `max_size` are served
//! with temporary overhead connections, and a background reaper trims the
//! idle set back towards `min_size`.

pub mod pool;

pub use pool::{ConnectionPool, Lease, OverheadPolicy, PoolConfig, PoolStats};
pub use pqpool_core::{
    Connection, Connector, PoolError, QueryResult, Result, Row, StatementResult, Transaction,
    Value,
};
