//! Connection pool implementation

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use pqpool_core::{Connection, Connector, PoolError, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::PoolConfig;
use super::lease::Lease;
use super::reaper;
use super::state::{Checkin, PoolState};
use super::stats::PoolStats;

/// State shared by the pool handle, every outstanding lease and the reaper
pub(crate) struct PoolShared {
    connection_string: String,
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    pub(crate) state: Mutex<PoolState>,
    pub(crate) cancel: CancellationToken,
}

impl PoolShared {
    pub(crate) fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Open a connection through the connector, honouring the open timeout
    async fn open(&self) -> Result<Box<dyn Connection>> {
        let open = self.connector.open(&self.connection_string);
        match self.config.open_timeout() {
            Some(limit) => tokio::time::timeout(limit, open).await.map_err(|_| {
                PoolError::Timeout(format!(
                    "opening a connection took longer than {:?}",
                    limit
                ))
            })?,
            None => open.await,
        }
    }

    /// Open `min_size` connections and run one acquire/release probe
    async fn warm_up(self: &Arc<Self>) {
        let min_size = self.config.min_size();
        for _ in 0..min_size {
            match self.open().await {
                Ok(conn) => self.state.lock().seed(conn),
                Err(e) => tracing::error!(error = %e, "failed to open warm-up connection"),
            }
        }

        let target = self
            .connector
            .target_host(&self.connection_string)
            .unwrap_or_else(|| "unknown".to_string());

        match self.checkout().await {
            Ok(lease) => {
                let host = lease.host().map(str::to_string).unwrap_or(target);
                let open = lease.is_open();
                lease.release().await;
                if open {
                    tracing::info!(
                        host = %host,
                        pool_size = self.state.lock().idle_len(),
                        "connection pool ready"
                    );
                } else {
                    tracing::warn!(host = %host, "probe connection is not open");
                }
            }
            Err(e) => tracing::error!(host = %target, error = %e, "failed to connect"),
        }
    }

    /// Hand out the oldest idle connection, or open a new one
    pub(crate) async fn checkout(self: &Arc<Self>) -> Result<Lease> {
        let idle = {
            let mut state = self.state.lock();
            if !state.is_running() {
                return Err(PoolError::Closed);
            }
            state.checkout()
        };
        if let Some(conn) = idle {
            tracing::trace!("reusing idle connection");
            return Ok(Lease::new(conn, false, Arc::clone(self)));
        }

        let conn = self.open().await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to open a new connection");
        })?;

        let burst = {
            let mut state = self.state.lock();
            if state.is_running() {
                Some(state.record_open(self.config.max_size()))
            } else {
                None
            }
        };
        let Some(burst) = burst else {
            close_quietly(conn).await;
            return Err(PoolError::Closed);
        };
        if burst {
            tracing::debug!(
                max_size = self.config.max_size(),
                overhead = self.state.lock().overhead(),
                "opened overhead connection above max_size"
            );
        }
        Ok(Lease::new(conn, burst, Arc::clone(self)))
    }

    fn checkin(&self, conn: Box<dyn Connection>, burst: bool, dirty: bool) -> Checkin {
        let mut state = self.state.lock();
        if dirty {
            tracing::debug!("connection released inside a transaction, discarding it");
            return state.checkin_dirty(conn, burst, self.config.overhead_policy());
        }
        state.checkin(
            conn,
            burst,
            self.config.max_size(),
            self.config.overhead_policy(),
        )
    }

    /// Take a connection back from a lease and carry out its fate
    pub(crate) async fn release(&self, conn: Box<dyn Connection>, burst: bool, dirty: bool) {
        let verdict = self.checkin(conn, burst, dirty);
        self.settle(verdict).await;
    }

    /// Release path for a dropped lease
    ///
    /// Bookkeeping happens right away; closing or reopening is handed to the
    /// current tokio runtime. Outside a runtime the connection is dropped,
    /// or pooled as is when it would have been revived.
    pub(crate) fn release_detached(
        self: &Arc<Self>,
        conn: Box<dyn Connection>,
        burst: bool,
        dirty: bool,
    ) {
        let verdict = self.checkin(conn, burst, dirty);
        if matches!(verdict, Checkin::Pooled) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(self);
                handle.spawn(async move {
                    shared.settle(verdict).await;
                });
            }
            Err(_) => self.settle_blocking(verdict),
        }
    }

    async fn settle(&self, verdict: Checkin) {
        match verdict {
            Checkin::Pooled => tracing::trace!("connection returned to idle queue"),
            Checkin::Discard(conn) => {
                tracing::debug!("closing released connection");
                close_quietly(conn).await;
            }
            Checkin::Orphaned(conn) => {
                tracing::debug!("pool closed while connection was leased");
                close_quietly(conn).await;
            }
            Checkin::Revive(dead) => self.revive(dead).await,
        }
    }

    fn settle_blocking(&self, verdict: Checkin) {
        match verdict {
            Checkin::Pooled => {}
            Checkin::Discard(conn) | Checkin::Orphaned(conn) => drop(conn),
            Checkin::Revive(dead) => {
                tracing::warn!("no runtime to reopen released connection, pooling it as is");
                let _ = self.state.lock().push_revived(dead);
            }
        }
    }

    async fn revive(&self, dead: Box<dyn Connection>) {
        let conn = match self.open().await {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::warn!(error = %e, "failed to reopen released connection, pooling it as is");
                dead
            }
        };
        let leftover = self.state.lock().push_revived(conn);
        if let Some(conn) = leftover {
            close_quietly(conn).await;
        }
    }

    fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats::new(
            state.total(),
            state.idle_len(),
            state.overhead(),
            self.config.min_size(),
            self.config.max_size(),
        )
    }
}

/// Close a connection, logging instead of failing
pub(crate) async fn close_quietly(conn: Box<dyn Connection>) {
    if conn.is_closed() {
        return;
    }
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close connection");
    }
}

/// A pool of reusable database connections
///
/// The pool opens `min_size` connections up front and hands them out via
/// [`ConnectionPool::acquire`]. It never makes a caller wait: when no idle
/// connection is available a new one is opened, even above `max_size`.
/// Those overhead connections are closed again as leases come back.
/// A background reaper closes one idle connection per tick while more than
/// `min_size` are idle.
///
/// Dropping the pool stops the reaper and closes idle connections on a
/// best-effort basis; call [`ConnectionPool::close`] to wait for both.
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// Create a pool and warm it up
    ///
    /// Invalid sizes fall back to `(3, 7)`. Warm-up and probe failures are
    /// logged; the pool is returned either way. Must be called within a
    /// tokio runtime, which hosts the reaper task.
    pub async fn new<C: Connector>(
        connection_string: impl Into<String>,
        config: PoolConfig,
        connector: C,
    ) -> Self {
        let config = config.validated();
        let shared = Arc::new(PoolShared {
            connection_string: connection_string.into(),
            state: Mutex::new(PoolState::new(config.max_size())),
            config,
            connector: Arc::new(connector),
            cancel: CancellationToken::new(),
        });

        shared.warm_up().await;
        let reaper = reaper::spawn(Arc::clone(&shared));

        Self {
            shared,
            reaper: Mutex::new(Some(reaper)),
        }
    }

    /// Create a pool with the given sizes and default settings otherwise
    pub async fn with_sizes<C: Connector>(
        connection_string: impl Into<String>,
        min_size: usize,
        max_size: usize,
        connector: C,
    ) -> Self {
        Self::new(connection_string, PoolConfig::new(min_size, max_size), connector).await
    }

    /// Lease a connection
    ///
    /// Reuses the oldest idle connection, otherwise opens a new one. Fails
    /// with [`PoolError::Connection`] (or [`PoolError::Timeout`]) when a new
    /// connection cannot be opened, and with [`PoolError::Closed`] after
    /// teardown.
    pub async fn acquire(&self) -> Result<Lease> {
        self.shared.checkout().await
    }

    /// Connections held by the pool, not counting overhead
    pub fn size_connections(&self) -> usize {
        let state = self.shared.state.lock();
        state.total().saturating_sub(state.overhead())
    }

    /// Connections opened above `max_size` that are still outstanding
    pub fn size_connections_overhead(&self) -> usize {
        self.shared.state.lock().overhead()
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Get the effective (validated) pool configuration
    pub fn config(&self) -> &PoolConfig {
        self.shared.config()
    }

    pub fn connection_string(&self) -> &str {
        &self.shared.connection_string
    }

    /// Whether the pool has been torn down
    pub fn is_closed(&self) -> bool {
        !self.shared.state.lock().is_running()
    }

    /// Tear the pool down
    ///
    /// Stops the reaper and waits for it to exit, then closes every idle
    /// connection and zeroes the counters. Leases still out are closed when
    /// they come back. Calling this more than once is a no-op.
    pub async fn close(&self) {
        self.shared.cancel.cancel();
        let reaper = self.reaper.lock().take();
        if let Some(handle) = reaper {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "reaper task ended abnormally");
            }
        }

        let drained = self.shared.state.lock().shutdown();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "closing idle connections");
        }
        for conn in drained {
            close_quietly(conn).await;
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        let drained = self.shared.state.lock().shutdown();
        if drained.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for conn in drained {
                        close_quietly(conn).await;
                    }
                });
            }
            Err(_) => drop(drained),
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", self.config())
            .field("stats", &self.stats())
            .finish()
    }
}
