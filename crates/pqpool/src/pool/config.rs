//! Pool configuration types

use std::time::Duration;

use pqpool_core::PoolError;
use serde::{Deserialize, Serialize};

/// Default minimum number of pooled connections
pub const DEFAULT_MIN_SIZE: usize = 2;
/// Default maximum number of pooled connections
pub const DEFAULT_MAX_SIZE: usize = 5;
/// Minimum size used when the configured sizes are invalid
pub const FALLBACK_MIN_SIZE: usize = 3;
/// Maximum size used when the configured sizes are invalid
pub const FALLBACK_MAX_SIZE: usize = 7;
/// Default interval between reaper ticks
pub const DEFAULT_REAP_INTERVAL_MS: u64 = 20_000;

/// Decides which released connection pays off an overhead slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverheadPolicy {
    /// Any release while overhead is outstanding is discarded, whichever
    /// connection it carries.
    #[default]
    Counter,
    /// Only connections that were opened above `max_size` are discarded.
    Tagged,
}

/// Configuration for a connection pool
///
/// Controls pool sizing, the reaper interval and how burst connections are
/// disposed of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connections opened eagerly and kept through reaping
    min_size: usize,
    /// Idle capacity; connections beyond this are overhead
    max_size: usize,
    /// Milliseconds between reaper ticks
    reap_interval_ms: u64,
    /// Upper bound on a single connector open, in milliseconds
    open_timeout_ms: Option<u64>,
    overhead_policy: OverheadPolicy,
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// Sizes are not checked here; [`PoolConfig::validated`] replaces an
    /// invalid pair with the fallback sizes when the pool is built.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size,
            reap_interval_ms: DEFAULT_REAP_INTERVAL_MS,
            open_timeout_ms: None,
            overhead_policy: OverheadPolicy::Counter,
        }
    }

    /// Set the reaper interval in milliseconds
    pub fn with_reap_interval_ms(mut self, interval_ms: u64) -> Self {
        self.reap_interval_ms = interval_ms;
        self
    }

    /// Bound every connector open by a timeout in milliseconds
    pub fn with_open_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.open_timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the overhead disposal policy
    pub fn with_overhead_policy(mut self, policy: OverheadPolicy) -> Self {
        self.overhead_policy = policy;
        self
    }

    /// Get the minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the reaper interval as a Duration, never shorter than 1ms
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms.max(1))
    }

    /// Get the open timeout as a Duration if set
    pub fn open_timeout(&self) -> Option<Duration> {
        self.open_timeout_ms.map(Duration::from_millis)
    }

    /// Get the overhead disposal policy
    pub fn overhead_policy(&self) -> OverheadPolicy {
        self.overhead_policy
    }

    /// Whether `0 < min_size <= max_size`
    pub fn is_valid(&self) -> bool {
        self.min_size > 0 && self.max_size > 0 && self.min_size <= self.max_size
    }

    /// Return this configuration with usable sizes
    ///
    /// An invalid pair is replaced by `(FALLBACK_MIN_SIZE, FALLBACK_MAX_SIZE)`
    /// and a warning is logged. Other settings are kept.
    pub fn validated(mut self) -> Self {
        if !self.is_valid() {
            let error = PoolError::Configuration(format!(
                "min_size {} and max_size {} must satisfy 0 < min_size <= max_size",
                self.min_size, self.max_size
            ));
            tracing::warn!(
                error = %error,
                fallback_min_size = FALLBACK_MIN_SIZE,
                fallback_max_size = FALLBACK_MAX_SIZE,
                "bad pool configuration, using fallback sizes"
            );
            self.min_size = FALLBACK_MIN_SIZE;
            self.max_size = FALLBACK_MAX_SIZE;
        }
        self
    }
}

impl Default for PoolConfig {
    /// Defaults:
    /// - min_size: 2
    /// - max_size: 5
    /// - reap_interval: 20 seconds
    /// - open_timeout: None
    /// - overhead_policy: Counter
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIZE, DEFAULT_MAX_SIZE)
    }
}
