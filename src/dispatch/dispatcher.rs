//! Ordered per-identifier task dispatcher.
//!
//! `N` single-worker queues, each with a bounded backlog. A task submitted
//! with `submit_async(id, ..)` always lands on queue `route(id) mod N`, so
//! tasks sharing an identifier run one at a time in submission order while
//! different identifiers run in parallel.
//!
//! `submit_sync` is a barrier. It takes the gate's write lock, which stops
//! new async submissions, waits until every queue has drained, then runs
//! its task on the calling thread before letting submissions resume.
//!
//! ```text
//! submit_async ──read──┐
//! submit_async ──read──┼──> gate ──> queue[route(id) % N] ──> worker thread
//! submit_sync  ──write─┘        drain all queues, run inline
//! ```

use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::DispatcherConfig;
use crate::dispatch::router::Router;
use crate::error::{DispatchError, Result};
use crate::metrics::IndexMetrics;

/// Unit of asynchronous work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    /// Acknowledged once every message queued before it has been handled.
    Drain(Sender<()>),
}

pub struct TaskDispatcher {
    router: Router,
    queue_capacity: usize,
    /// `None` once shut down.
    gate: RwLock<Option<Vec<Sender<Message>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    metrics: Option<Arc<IndexMetrics>>,
}

impl TaskDispatcher {
    // -- Constructors ---------------------------------------------------------

    /// Start `config.worker_count` worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `worker_count` or `queue_capacity` is 0.
    pub fn new(config: &DispatcherConfig) -> Result<Self> {
        Self::start(config, None)
    }

    pub fn with_metrics(config: &DispatcherConfig, metrics: Arc<IndexMetrics>) -> Result<Self> {
        Self::start(config, Some(metrics))
    }

    fn start(config: &DispatcherConfig, metrics: Option<Arc<IndexMetrics>>) -> Result<Self> {
        assert!(config.worker_count > 0, "worker_count must be > 0");
        assert!(config.queue_capacity > 0, "queue_capacity must be > 0");

        let mut senders = Vec::with_capacity(config.worker_count);
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            let (tx, rx) = bounded(config.queue_capacity);
            let worker_metrics = metrics.clone();
            let spawned = thread::Builder::new()
                .name(format!("keyslice-dispatch-{index}"))
                .spawn(move || run_worker(index, rx, worker_metrics));
            let handle = match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    // Closing the queues already created lets their workers exit.
                    drop(senders);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            };
            senders.push(tx);
            handles.push(handle);
        }

        tracing::debug!(
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            "task dispatcher started"
        );

        Ok(Self {
            router: Router::new(config.worker_count),
            queue_capacity: config.queue_capacity,
            gate: RwLock::new(Some(senders)),
            workers: Mutex::new(handles),
            metrics,
        })
    }

    // -- Accessors ------------------------------------------------------------

    pub fn worker_count(&self) -> usize {
        self.router.buckets()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Queue that tasks for `id` are routed to.
    pub fn queue_for<H: Hash + ?Sized>(&self, id: &H) -> usize {
        self.router.bucket_for(id)
    }

    /// Tasks waiting in all queues (not counting ones currently running).
    pub fn pending(&self) -> usize {
        let gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        gate.as_ref().map_or(0, |senders| senders.iter().map(Sender::len).sum())
    }

    pub fn is_shutdown(&self) -> bool {
        self.gate.read().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    // -- Submission -----------------------------------------------------------

    /// Enqueue `task` on the queue owning `id`.
    ///
    /// Blocks while that queue's backlog is full or while a barrier is
    /// running. Tasks with equal `id` run in submission order; no order is
    /// implied across identifiers. A task that panics is logged and does not
    /// stop its worker.
    pub fn submit_async<H, F>(&self, id: &H, task: F) -> std::result::Result<(), DispatchError>
    where
        H: Hash + ?Sized,
        F: FnOnce() + Send + 'static,
    {
        let gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        let senders = gate.as_ref().ok_or(DispatchError::Shutdown)?;
        let queue = self.router.bucket_for(id);
        senders[queue]
            .send(Message::Run(Box::new(task)))
            .map_err(|_| DispatchError::WorkerGone(queue))?;
        if let Some(metrics) = &self.metrics {
            metrics.record_async_submit();
        }
        Ok(())
    }

    /// Run `task` on the calling thread once every queue is drained.
    ///
    /// No async task starts between the drain and the end of `task`. If
    /// `task` panics the panic propagates to the caller and the dispatcher
    /// stays usable.
    pub fn submit_sync<F, R>(&self, task: F) -> std::result::Result<R, DispatchError>
    where
        F: FnOnce() -> R,
    {
        let gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let senders = gate.as_ref().ok_or(DispatchError::Shutdown)?;

        let started = Instant::now();
        let mut acks = Vec::with_capacity(senders.len());
        for (queue, sender) in senders.iter().enumerate() {
            let (ack_tx, ack_rx) = bounded(1);
            sender
                .send(Message::Drain(ack_tx))
                .map_err(|_| DispatchError::WorkerGone(queue))?;
            acks.push((queue, ack_rx));
        }
        for (queue, ack) in acks {
            ack.recv().map_err(|_| DispatchError::WorkerGone(queue))?;
        }

        let waited_us = started.elapsed().as_micros() as u64;
        if let Some(metrics) = &self.metrics {
            metrics.record_barrier(waited_us);
        }
        tracing::debug!(waited_us, "dispatcher drained, running barrier task");

        Ok(task())
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Stop accepting tasks, let workers finish what is queued, and join them.
    ///
    /// Idempotent. Later submissions fail with `DispatchError::Shutdown`.
    pub fn shutdown(&self) {
        let senders = self.gate.write().unwrap_or_else(PoisonError::into_inner).take();
        if senders.is_none() {
            return;
        }
        drop(senders);

        let handles = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        let current = thread::current().id();
        for handle in handles {
            // A worker cannot join itself (dispatcher dropped from inside a task).
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!("dispatch worker exited by panic");
            }
        }
        tracing::debug!("task dispatcher shut down");
    }
}

impl Drop for TaskDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TaskDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDispatcher")
            .field("workers", &self.worker_count())
            .field("queue_capacity", &self.queue_capacity)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

fn run_worker(index: usize, queue: Receiver<Message>, metrics: Option<Arc<IndexMetrics>>) {
    for message in queue.iter() {
        match message {
            Message::Run(task) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    tracing::error!(worker = index, %reason, "dispatched task panicked");
                    if let Some(metrics) = &metrics {
                        metrics.record_task_panic();
                    }
                }
            }
            Message::Drain(ack) => {
                // The barrier holder may have given up; nothing to report then.
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!(worker = index, "dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config(workers: usize, capacity: usize) -> DispatcherConfig {
        DispatcherConfig {
            worker_count: workers,
            queue_capacity: capacity,
        }
    }

    #[test]
    fn test_same_id_runs_in_order() {
        let dispatcher = TaskDispatcher::new(&config(4, 16)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..200 {
            let seen = Arc::clone(&seen);
            dispatcher
                .submit_async("partition-a", move || seen.lock().unwrap().push(i))
                .unwrap();
        }
        dispatcher.submit_sync(|| ()).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_barrier_sees_all_prior_tasks() {
        let dispatcher = TaskDispatcher::new(&config(4, 8)).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for i in 0..100u32 {
            let done = Arc::clone(&done);
            dispatcher
                .submit_async(&i, move || {
                    thread::sleep(Duration::from_micros(50));
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        let observed = dispatcher.submit_sync(|| done.load(Ordering::SeqCst)).unwrap();
        assert_eq!(observed, 100);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let metrics = Arc::new(IndexMetrics::new());
        let dispatcher = TaskDispatcher::with_metrics(&config(1, 4), Arc::clone(&metrics)).unwrap();
        dispatcher.submit_async("x", || panic!("boom")).unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        dispatcher
            .submit_async("x", move || {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        dispatcher.submit_sync(|| ()).unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.task_panics, 1);
        assert_eq!(snapshot.async_submits, 2);
        assert_eq!(snapshot.sync_barriers, 1);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let dispatcher = TaskDispatcher::new(&config(2, 4)).unwrap();
        dispatcher.shutdown();
        dispatcher.shutdown();
        assert!(dispatcher.is_shutdown());
        assert_eq!(dispatcher.submit_async("a", || ()), Err(DispatchError::Shutdown));
        assert_eq!(dispatcher.submit_sync(|| 1), Err(DispatchError::Shutdown));
    }

    #[test]
    fn test_shutdown_runs_queued_tasks() {
        let dispatcher = TaskDispatcher::new(&config(2, 64)).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for i in 0..50u32 {
            let done = Arc::clone(&done);
            dispatcher
                .submit_async(&i, move || {
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        dispatcher.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_barrier_panic_leaves_dispatcher_usable() {
        let dispatcher = Arc::new(TaskDispatcher::new(&config(2, 4)).unwrap());
        let d = Arc::clone(&dispatcher);
        let result = thread::spawn(move || d.submit_sync(|| panic!("barrier task failed"))).join();
        assert!(result.is_err());

        assert_eq!(dispatcher.submit_sync(|| 7).unwrap(), 7);
        dispatcher.submit_async("after", || ()).unwrap();
    }

    #[test]
    fn test_queue_for_is_stable() {
        let dispatcher = TaskDispatcher::new(&config(8, 4)).unwrap();
        assert_eq!(dispatcher.worker_count(), 8);
        assert_eq!(dispatcher.queue_for("p1"), dispatcher.queue_for("p1"));
        assert!(dispatcher.queue_for("p1") < 8);
    }

    #[test]
    #[should_panic(expected = "worker_count must be > 0")]
    fn test_zero_workers_panics() {
        let _ = TaskDispatcher::new(&config(0, 4));
    }
}
