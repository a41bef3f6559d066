//! Bounded-concurrency worker pool.
//!
//! Tasks are spawned onto the tokio runtime immediately and wait on the pool's
//! semaphore before running, so the semaphore's wait list is the pool's ready
//! queue. Submission never blocks.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lake_core::Stage;
use telemetry::{metrics, Gauge};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;

struct PoolState {
    queued: AtomicUsize,
    running: AtomicUsize,
    /// Submitted and not yet finished; drives `drain` and `wait_for_depth`.
    outstanding: AtomicUsize,
    changed: Notify,
    running_gauge: &'static Gauge,
    queued_gauge: &'static Gauge,
}

/// Keeps the pool counters right even if the task panics or is aborted.
struct TaskGuard {
    state: Arc<PoolState>,
    started: bool,
}

impl TaskGuard {
    fn start(&mut self) {
        self.state.running.fetch_add(1, Ordering::SeqCst);
        self.state.queued.fetch_sub(1, Ordering::SeqCst);
        self.state.running_gauge.inc();
        self.state.queued_gauge.dec();
        self.started = true;
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.started {
            self.state.running.fetch_sub(1, Ordering::SeqCst);
            self.state.running_gauge.dec();
        } else {
            self.state.queued.fetch_sub(1, Ordering::SeqCst);
            self.state.queued_gauge.dec();
        }
        self.state.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.state.changed.notify_waiters();
    }
}

/// A pool running at most `concurrency` tasks at a time.
#[derive(Clone)]
pub struct WorkerPool {
    concurrency: usize,
    semaphore: Arc<Semaphore>,
    state: Arc<PoolState>,
}

impl WorkerPool {
    pub fn new(stage: Stage, concurrency: usize) -> Self {
        let (running_gauge, queued_gauge) = match stage {
            Stage::Match => (&metrics().match_pool_running, &metrics().match_pool_queued),
            Stage::Timeline => (
                &metrics().timeline_pool_running,
                &metrics().timeline_pool_queued,
            ),
        };
        let concurrency = concurrency.max(1);

        Self {
            concurrency,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            state: Arc::new(PoolState {
                queued: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                outstanding: AtomicUsize::new(0),
                changed: Notify::new(),
                running_gauge,
                queued_gauge,
            }),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.state.queued.load(Ordering::SeqCst)
    }

    /// Tasks holding a slot.
    pub fn running(&self) -> usize {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Submitted tasks that have not finished.
    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::SeqCst)
    }

    /// Queues a task. The task counts as outstanding from this call on.
    pub fn submit<F, T>(&self, task: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.state.outstanding.fetch_add(1, Ordering::SeqCst);
        self.state.queued.fetch_add(1, Ordering::SeqCst);
        self.state.queued_gauge.inc();

        let mut guard = TaskGuard {
            state: self.state.clone(),
            started: false,
        };
        let semaphore = self.semaphore.clone();

        tokio::spawn(async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire_owned().await.ok();
            guard.start();
            let output = task.await;
            drop(guard);
            output
        })
    }

    /// Waits until at most `max` tasks are outstanding.
    pub async fn wait_for_depth(&self, max: usize) {
        loop {
            let changed = self.state.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if self.outstanding() <= max {
                return;
            }
            changed.await;
        }
    }

    /// Waits until every submitted task, including ones submitted while
    /// draining, has finished.
    pub async fn drain(&self) {
        self.wait_for_depth(0).await;
    }
}
