//! Runtime counters for a memory network.
//!
//! Lock-free `AtomicU64` counters, incremented on the hot path (including
//! from concurrent readers) and read on export.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for one store.
#[derive(Debug)]
pub struct NetworkCounters {
    /// Records accepted by `store`.
    pub records_stored: AtomicU64,
    /// Records rejected by validation.
    pub records_rejected: AtomicU64,
    /// Records removed by the capacity manager.
    pub records_evicted: AtomicU64,
    /// Records removed explicitly.
    pub records_removed: AtomicU64,
    /// Association edges created.
    pub associations_created: AtomicU64,
    /// Queries executed.
    pub queries_served: AtomicU64,
    /// Records returned across all queries.
    pub records_returned: AtomicU64,
}

impl NetworkCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records_stored: AtomicU64::new(0),
            records_rejected: AtomicU64::new(0),
            records_evicted: AtomicU64::new(0),
            records_removed: AtomicU64::new(0),
            associations_created: AtomicU64::new(0),
            queries_served: AtomicU64::new(0),
            records_returned: AtomicU64::new(0),
        }
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            records_stored: self.records_stored.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            records_evicted: self.records_evicted.load(Ordering::Relaxed),
            records_removed: self.records_removed.load(Ordering::Relaxed),
            associations_created: self.associations_created.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            records_returned: self.records_returned.load(Ordering::Relaxed),
        }
    }
}

impl Default for NetworkCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Records accepted.
    pub records_stored: u64,
    /// Records rejected.
    pub records_rejected: u64,
    /// Records evicted.
    pub records_evicted: u64,
    /// Records removed explicitly.
    pub records_removed: u64,
    /// Edges created.
    pub associations_created: u64,
    /// Queries executed.
    pub queries_served: u64,
    /// Records returned by queries.
    pub records_returned: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP memnet_records_stored_total Records accepted by store\n\
             # TYPE memnet_records_stored_total counter\n\
             memnet_records_stored_total {}\n\
             # HELP memnet_records_rejected_total Records rejected by validation\n\
             # TYPE memnet_records_rejected_total counter\n\
             memnet_records_rejected_total {}\n\
             # HELP memnet_records_evicted_total Records evicted by the capacity manager\n\
             # TYPE memnet_records_evicted_total counter\n\
             memnet_records_evicted_total {}\n\
             # HELP memnet_records_removed_total Records removed explicitly\n\
             # TYPE memnet_records_removed_total counter\n\
             memnet_records_removed_total {}\n\
             # HELP memnet_associations_created_total Association edges created\n\
             # TYPE memnet_associations_created_total counter\n\
             memnet_associations_created_total {}\n\
             # HELP memnet_queries_served_total Queries executed\n\
             # TYPE memnet_queries_served_total counter\n\
             memnet_queries_served_total {}\n\
             # HELP memnet_records_returned_total Records returned by queries\n\
             # TYPE memnet_records_returned_total counter\n\
             memnet_records_returned_total {}\n",
            self.records_stored,
            self.records_rejected,
            self.records_evicted,
            self.records_removed,
            self.associations_created,
            self.queries_served,
            self.records_returned,
        )
    }
}
