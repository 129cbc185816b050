//! Guarded pool bookkeeping
//!
//! Every mutation of the idle queue and the two counters goes through
//! [`PoolState`], which the pool keeps behind a single mutex. Nothing in
//! here performs I/O: physical opens and closes happen outside the lock,
//! driven by the [`Checkin`] verdicts returned from this module.

use std::collections::VecDeque;

use pqpool_core::Connection;

use super::config::OverheadPolicy;

/// What the caller must do with a connection handed back by a lease
pub(crate) enum Checkin {
    /// The connection went back onto the idle queue.
    Pooled,
    /// Counters were already decremented; close the connection.
    Discard(Box<dyn Connection>),
    /// The connection is dead but should be pooled. Reopen it and hand the
    /// result to [`PoolState::push_revived`]. It still counts as leased.
    Revive(Box<dyn Connection>),
    /// The pool was torn down while the lease was out. Close the connection
    /// and leave the counters alone.
    Orphaned(Box<dyn Connection>),
}

pub(crate) struct PoolState {
    /// Oldest released at the front
    idle: VecDeque<Box<dyn Connection>>,
    /// Connections opened by this pool, idle and leased
    total: usize,
    /// Connections opened above `max_size`, pending disposal on return
    overhead: usize,
    running: bool,
}

impl PoolState {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            idle: VecDeque::with_capacity(capacity),
            total: 0,
            overhead: 0,
            running: true,
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.total
    }

    pub(crate) fn overhead(&self) -> usize {
        self.overhead
    }

    pub(crate) fn idle_len(&self) -> usize {
        self.idle.len()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    /// Add a warm-up connection straight to the idle queue
    pub(crate) fn seed(&mut self, conn: Box<dyn Connection>) {
        self.idle.push_back(conn);
        self.total += 1;
    }

    /// Take the oldest idle connection
    pub(crate) fn checkout(&mut self) -> Option<Box<dyn Connection>> {
        self.idle.pop_front()
    }

    /// Account for a freshly opened connection about to be leased
    ///
    /// Returns `true` when the connection takes the pool above `max_size`.
    pub(crate) fn record_open(&mut self, max_size: usize) -> bool {
        self.total += 1;
        if self.total > max_size {
            self.overhead += 1;
            true
        } else {
            false
        }
    }

    /// Decide the fate of a connection coming back from a lease
    pub(crate) fn checkin(
        &mut self,
        conn: Box<dyn Connection>,
        burst: bool,
        max_size: usize,
        policy: OverheadPolicy,
    ) -> Checkin {
        if !self.running {
            return Checkin::Orphaned(conn);
        }

        if self.settle_overhead(burst, policy) {
            self.total = self.total.saturating_sub(1);
            return Checkin::Discard(conn);
        }

        if self.idle.is_empty() || self.idle.len() < max_size {
            if conn.is_closed() {
                return Checkin::Revive(conn);
            }
            self.idle.push_back(conn);
            return Checkin::Pooled;
        }

        self.total = self.total.saturating_sub(1);
        Checkin::Discard(conn)
    }

    /// Take back a connection that may still be inside a transaction
    ///
    /// It is never pooled. Counters are settled as for any other release and
    /// the caller closes it.
    pub(crate) fn checkin_dirty(
        &mut self,
        conn: Box<dyn Connection>,
        burst: bool,
        policy: OverheadPolicy,
    ) -> Checkin {
        if !self.running {
            return Checkin::Orphaned(conn);
        }
        self.settle_overhead(burst, policy);
        self.total = self.total.saturating_sub(1);
        Checkin::Discard(conn)
    }

    /// Pay off one overhead slot if this release owes it
    fn settle_overhead(&mut self, burst: bool, policy: OverheadPolicy) -> bool {
        let settles = match policy {
            OverheadPolicy::Counter => self.overhead > 0,
            OverheadPolicy::Tagged => burst,
        };
        if settles {
            self.overhead = self.overhead.saturating_sub(1);
        }
        settles
    }

    /// Finish a [`Checkin::Revive`]
    ///
    /// Returns the connection back if the pool closed in the meantime.
    pub(crate) fn push_revived(&mut self, conn: Box<dyn Connection>) -> Option<Box<dyn Connection>> {
        if !self.running {
            return Some(conn);
        }
        self.idle.push_back(conn);
        None
    }

    /// Pop the oldest idle connection if the idle set is above `min_size`
    pub(crate) fn reap_one(&mut self, min_size: usize) -> Option<Box<dyn Connection>> {
        if !self.running || self.idle.len() <= min_size {
            return None;
        }
        let conn = self.idle.pop_front()?;
        self.total = self.total.saturating_sub(1);
        Some(conn)
    }

    /// Stop the pool and hand back every idle connection
    ///
    /// Counters are zeroed. Calling it again returns nothing.
    pub(crate) fn shutdown(&mut self) -> Vec<Box<dyn Connection>> {
        self.running = false;
        self.total = 0;
        self.overhead = 0;
        self.idle.drain(..).collect()
    }
}
