//! A connection borrowed from the pool

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pqpool_core::{Connection, PoolError, QueryResult, Result};

use super::pool::PoolShared;

/// A connection borrowed from the pool
///
/// The connection goes back to the pool exactly once: through
/// [`Lease::release`], or when the lease is dropped. Dropping does the
/// bookkeeping immediately and leaves any close or reopen to the current
/// tokio runtime.
///
/// A connection whose transaction was never finished, because an
/// [`Lease::execute`] future was dropped midway, is closed instead of pooled.
pub struct Lease {
    connection: Option<Box<dyn Connection>>,
    /// Opened above `max_size`
    burst: bool,
    /// Set from `BEGIN` until the matching `COMMIT` or `ROLLBACK` succeeds
    in_transaction: AtomicBool,
    pool: Arc<PoolShared>,
}

impl Lease {
    pub(crate) fn new(connection: Box<dyn Connection>, burst: bool, pool: Arc<PoolShared>) -> Self {
        Self {
            connection: Some(connection),
            burst,
            in_transaction: AtomicBool::new(false),
            pool,
        }
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &(dyn Connection + 'static) {
        self.connection.as_deref().expect("connection taken")
    }

    /// Whether this lease's connection was opened above `max_size`
    pub fn is_burst(&self) -> bool {
        self.burst
    }

    /// Run `sql` in its own transaction and commit it
    ///
    /// On failure the transaction is rolled back, the error is logged and an
    /// empty result is returned. Use [`Lease::try_execute`] to see the error.
    pub async fn execute(&self, sql: &str) -> QueryResult {
        match self.try_execute(sql).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "query failed");
                QueryResult::empty()
            }
        }
    }

    /// Run `sql` in its own transaction and commit it, surfacing failures
    ///
    /// Any failure after `BEGIN` rolls the transaction back and is reported
    /// as [`PoolError::Query`].
    pub async fn try_execute(&self, sql: &str) -> Result<QueryResult> {
        self.in_transaction.store(true, Ordering::SeqCst);
        let txn = match self.connection().begin_transaction().await {
            Ok(txn) => txn,
            Err(e) => {
                self.in_transaction.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let outcome = txn.query(sql, &[]).await;
        match outcome {
            Ok(result) => {
                txn.commit().await.map_err(into_query_error)?;
                self.in_transaction.store(false, Ordering::SeqCst);
                Ok(result)
            }
            Err(e) => {
                match txn.rollback().await {
                    Ok(()) => self.in_transaction.store(false, Ordering::SeqCst),
                    Err(rollback) => {
                        tracing::warn!(error = %rollback, "failed to roll back transaction");
                    }
                }
                Err(into_query_error(e))
            }
        }
    }

    fn is_dirty(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    /// Give the connection back to the pool and wait for the pool to finish
    /// with it
    pub async fn release(mut self) {
        let dirty = self.is_dirty();
        if let Some(conn) = self.connection.take() {
            self.pool.release(conn, self.burst, dirty).await;
        }
    }
}

fn into_query_error(e: PoolError) -> PoolError {
    match e {
        PoolError::Query(_) => e,
        other => PoolError::Query(other.to_string()),
    }
}

impl Deref for Lease {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let dirty = self.is_dirty();
        if let Some(conn) = self.connection.take() {
            self.pool.release_detached(conn, self.burst, dirty);
        }
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("driver", &self.connection.as_deref().map(|c| c.driver_name()))
            .field("host", &self.connection.as_deref().and_then(|c| c.host()))
            .field("burst", &self.burst)
            .finish()
    }
}
