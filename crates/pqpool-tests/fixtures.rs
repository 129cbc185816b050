//! Shared fixtures: a counting mock connector and test logging

use async_trait::async_trait;
use pqpool::{ConnectionPool, PoolConfig};
use pqpool_core::{
    Connection, Connector, QueryResult, Result, StatementResult, Transaction, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Connection string handed to pools built on [`MockConnector`]
pub const MOCK_DSN: &str = "host=mock dbname=pqpool";

/// Connector whose connections only count opens and closes
#[derive(Default)]
pub struct MockConnector {
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockConnector {
    /// New shareable connector
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connections opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Connections closed so far
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet closed
    pub fn live(&self) -> usize {
        self.opened() - self.closed()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _connection_string: &str) -> Result<Box<dyn Connection>> {
        // Yield so concurrent acquires interleave
        tokio::task::yield_now().await;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            closed: AtomicBool::new(false),
            closed_count: self.closed.clone(),
        }))
    }

}

struct MockConnection {
    closed: AtomicBool,
    closed_count: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult::default())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(MockTransaction))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closed_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockTransaction;

#[async_trait]
impl Transaction for MockTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult::default())
    }
}

/// Build a pool on a fresh [`MockConnector`]
pub async fn mock_pool(config: PoolConfig) -> (ConnectionPool, Arc<MockConnector>) {
    initialize_logging();
    let connector = MockConnector::new();
    let pool = ConnectionPool::new(MOCK_DSN, config, connector.clone()).await;
    (pool, connector)
}

/// Initialize logging for tests if not already initialized
pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pqpool=debug,pqpool_tests=debug"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
