//! Index maintenance and search metrics
//!
//! Lightweight, thread-safe counters shared by the dispatcher and the
//! search index. One collector per open index, created at open time and
//! passed around in an `Arc`.
//!
//! # Design Decisions
//!
//! - **Thread-safe**: counters are `AtomicU64`, bumped with relaxed ordering
//! - **Bounded memory**: the search latency window is a fixed-size ring
//! - **O(1) per-operation**: recording is O(1) amortized; percentiles are
//!   computed only when a snapshot is taken
//!
//! # Example
//!
//! ```no_run
//! use keyslice::metrics::IndexMetrics;
//!
//! let metrics = IndexMetrics::new();
//! metrics.record_search(250, 10);
//!
//! let stats = metrics.snapshot();
//! println!("p50: {}us", stats.search_p50_us);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Number of search latencies retained for percentile calculation.
const LATENCY_WINDOW_SIZE: usize = 1000;

/// Searches at or above this latency count as slow.
pub const SLOW_SEARCH_THRESHOLD_US: u64 = 100_000;

/// Thread-safe metrics collector for one index.
pub struct IndexMetrics {
    // ========================================================================
    // Dispatcher
    // ========================================================================
    /// Tasks accepted by `submit_async`
    async_submits: AtomicU64,

    /// Barriers run through `submit_sync`
    sync_barriers: AtomicU64,

    /// Total time barriers spent waiting for queues to drain (us)
    barrier_wait_us: AtomicU64,

    /// Longest single drain wait (us)
    max_barrier_wait_us: AtomicU64,

    /// Tasks that panicked on a worker
    task_panics: AtomicU64,

    // ========================================================================
    // Maintenance
    // ========================================================================
    rows_indexed: AtomicU64,
    rows_deleted: AtomicU64,
    partitions_deleted: AtomicU64,

    // ========================================================================
    // Search
    // ========================================================================
    search_count: AtomicU64,
    slow_search_count: AtomicU64,
    rows_returned: AtomicU64,

    /// Rolling window of recent search latencies (us).
    latencies_us: Mutex<VecDeque<u64>>,

    started_at: Instant,
}

/// Point-in-time copy of all metrics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub async_submits: u64,
    pub sync_barriers: u64,
    /// Average drain wait per barrier (us)
    pub barrier_wait_avg_us: u64,
    pub barrier_wait_max_us: u64,
    pub task_panics: u64,

    pub rows_indexed: u64,
    pub rows_deleted: u64,
    pub partitions_deleted: u64,

    pub search_count: u64,
    pub slow_search_count: u64,
    pub rows_returned: u64,
    /// 50th percentile search latency over the recent window (us)
    pub search_p50_us: u64,
    /// 95th percentile search latency (us)
    pub search_p95_us: u64,
    /// 99th percentile search latency (us)
    pub search_p99_us: u64,

    pub uptime_secs: u64,
}

impl Default for IndexMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexMetrics {
    pub fn new() -> Self {
        Self {
            async_submits: AtomicU64::new(0),
            sync_barriers: AtomicU64::new(0),
            barrier_wait_us: AtomicU64::new(0),
            max_barrier_wait_us: AtomicU64::new(0),
            task_panics: AtomicU64::new(0),
            rows_indexed: AtomicU64::new(0),
            rows_deleted: AtomicU64::new(0),
            partitions_deleted: AtomicU64::new(0),
            search_count: AtomicU64::new(0),
            slow_search_count: AtomicU64::new(0),
            rows_returned: AtomicU64::new(0),
            latencies_us: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW_SIZE)),
            started_at: Instant::now(),
        }
    }

    // -- Dispatcher -----------------------------------------------------------

    pub fn record_async_submit(&self) {
        self.async_submits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one barrier and how long it waited for the queues to drain.
    pub fn record_barrier(&self, wait_us: u64) {
        self.sync_barriers.fetch_add(1, Ordering::Relaxed);
        self.barrier_wait_us.fetch_add(wait_us, Ordering::Relaxed);
        self.max_barrier_wait_us.fetch_max(wait_us, Ordering::Relaxed);
    }

    pub fn record_task_panic(&self) {
        self.task_panics.fetch_add(1, Ordering::Relaxed);
    }

    // -- Maintenance ----------------------------------------------------------

    pub fn record_indexed(&self, rows: u64) {
        self.rows_indexed.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_deleted(&self, rows: u64) {
        self.rows_deleted.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_partition_deleted(&self) {
        self.partitions_deleted.fetch_add(1, Ordering::Relaxed);
    }

    // -- Search ---------------------------------------------------------------

    /// Record a completed search.
    ///
    /// O(1) amortized: atomic increments plus one bounded deque push.
    pub fn record_search(&self, duration_us: u64, rows: u64) {
        self.search_count.fetch_add(1, Ordering::Relaxed);
        self.rows_returned.fetch_add(rows, Ordering::Relaxed);
        if duration_us >= SLOW_SEARCH_THRESHOLD_US {
            self.slow_search_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(duration_us, rows, "slow search");
        }

        let mut latencies = self.latencies_us.lock().unwrap_or_else(PoisonError::into_inner);
        if latencies.len() >= LATENCY_WINDOW_SIZE {
            latencies.pop_front();
        }
        latencies.push_back(duration_us);
    }

    /// Snapshot all counters and compute latency percentiles.
    ///
    /// O(LATENCY_WINDOW_SIZE log LATENCY_WINDOW_SIZE) for the percentile sort.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (p50, p95, p99) = {
            let latencies = self.latencies_us.lock().unwrap_or_else(PoisonError::into_inner);
            if latencies.is_empty() {
                (0, 0, 0)
            } else {
                let mut sorted: Vec<u64> = latencies.iter().copied().collect();
                sorted.sort_unstable();
                let len = sorted.len();
                let at = |pct: usize| sorted[(len * pct / 100).min(len - 1)];
                (at(50), at(95), at(99))
            }
        };

        let barriers = self.sync_barriers.load(Ordering::Relaxed);
        let barrier_wait_avg_us = if barriers > 0 {
            self.barrier_wait_us.load(Ordering::Relaxed) / barriers
        } else {
            0
        };

        MetricsSnapshot {
            async_submits: self.async_submits.load(Ordering::Relaxed),
            sync_barriers: barriers,
            barrier_wait_avg_us,
            barrier_wait_max_us: self.max_barrier_wait_us.load(Ordering::Relaxed),
            task_panics: self.task_panics.load(Ordering::Relaxed),
            rows_indexed: self.rows_indexed.load(Ordering::Relaxed),
            rows_deleted: self.rows_deleted.load(Ordering::Relaxed),
            partitions_deleted: self.partitions_deleted.load(Ordering::Relaxed),
            search_count: self.search_count.load(Ordering::Relaxed),
            slow_search_count: self.slow_search_count.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            search_p50_us: p50,
            search_p95_us: p95,
            search_p99_us: p99,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}
