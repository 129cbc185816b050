//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of a connection pool's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Connections opened by the pool (idle + leased)
    total: usize,
    /// Connections sitting in the idle queue
    idle: usize,
    /// Connections currently out on a lease
    leased: usize,
    /// Connections opened above `max_size`
    overhead: usize,
    min_size: usize,
    max_size: usize,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new(
        total: usize,
        idle: usize,
        overhead: usize,
        min_size: usize,
        max_size: usize,
    ) -> Self {
        Self {
            total,
            idle,
            leased: total.saturating_sub(idle),
            overhead,
            min_size,
            max_size,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn leased(&self) -> usize {
        self.leased
    }

    pub fn overhead(&self) -> usize {
        self.overhead
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Share of open connections that are leased (0.0 to 1.0)
    ///
    /// Returns 0.0 if total is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.leased as f64 / self.total as f64
        }
    }

    /// Whether the pool is currently running connections above `max_size`
    pub fn is_bursting(&self) -> bool {
        self.overhead > 0
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new(0, 0, 0, 0, 0)
    }
}
