//! Host probing and index sizing.
//!
//! `ResourceManager::auto_tune()` reads CPU and RAM once and turns them into
//! shard and dispatcher sizes. Nothing is cached between calls.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

// ── Constants ───────────────────────────────────────────────────────

const GB: u64 = 1 << 30;

/// Below this much RAM the index runs a single shard.
const SHARDING_MIN_MEMORY: u64 = 2 * GB;

/// Below this much RAM the dispatcher keeps at most two workers.
const FULL_WORKERS_MIN_MEMORY: u64 = 4 * GB;

const MAX_SHARDS: usize = 16;
const MAX_WORKERS: usize = 16;

/// Estimated bytes held by one queued maintenance task.
const BYTES_PER_TASK: u64 = 512;

/// Share of available memory the queued backlog may occupy, as 1/N.
const QUEUE_MEMORY_DIVISOR: u64 = 1000;

const QUEUE_CAPACITY_MIN: usize = 128;
const QUEUE_CAPACITY_MAX: usize = 8192;

// ── HostResources ───────────────────────────────────────────────────

/// CPU and memory figures the sizing rules read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostResources {
    pub cpus: usize,
    pub total_memory: u64,
    pub available_memory: u64,
}

impl HostResources {
    pub fn probe() -> Self {
        let sys = System::new_with_specifics(RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()));
        Self {
            cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            total_memory: sys.total_memory(),
            available_memory: sys.available_memory(),
        }
    }
}

// ── TuningProfile ───────────────────────────────────────────────────

/// Index sizing for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningProfile {
    pub shard_count: usize,
    /// Dispatcher queues, one worker thread each.
    pub worker_count: usize,
    /// Backlog bound per dispatcher queue.
    pub queue_capacity: usize,
}

impl TuningProfile {
    /// - shards: CPUs rounded up to a power of two, at most 16; one shard under 2 GB.
    /// - workers: one per CPU up to 16; half the CPUs, at most two, under 4 GB.
    /// - queue capacity: a thousandth of available memory at 512 bytes a task,
    ///   kept within 128..=8192.
    pub fn for_host(host: &HostResources) -> Self {
        let shard_count = if host.total_memory < SHARDING_MIN_MEMORY {
            1
        } else {
            host.cpus.next_power_of_two().min(MAX_SHARDS)
        };

        let worker_count = if host.total_memory < FULL_WORKERS_MIN_MEMORY {
            (host.cpus / 2).clamp(1, 2)
        } else {
            host.cpus.clamp(1, MAX_WORKERS)
        };

        let backlog_tasks = host.available_memory / QUEUE_MEMORY_DIVISOR / BYTES_PER_TASK;
        let queue_capacity = usize::try_from(backlog_tasks)
            .unwrap_or(usize::MAX)
            .clamp(QUEUE_CAPACITY_MIN, QUEUE_CAPACITY_MAX);

        Self {
            shard_count,
            worker_count,
            queue_capacity,
        }
    }
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self {
            shard_count: 4,
            worker_count: 4,
            queue_capacity: 1024,
        }
    }
}

// ── ResourceManager ─────────────────────────────────────────────────

pub struct ResourceManager;

impl ResourceManager {
    pub fn auto_tune() -> TuningProfile {
        let host = HostResources::probe();
        let profile = TuningProfile::for_host(&host);
        tracing::debug!(
            cpus = host.cpus,
            shards = profile.shard_count,
            workers = profile.worker_count,
            queue_capacity = profile.queue_capacity,
            "auto-tuned index resources"
        );
        profile
    }
}
