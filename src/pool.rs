//! Bounded worker pool for CPU-bound work
//!
//! Password hashing, page-count probing and page rasterization are all too
//! expensive to run on the async dispatch threads. They are submitted here
//! instead.
//!
//! # Design
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         WorkerPool                             │
//! │                                                                │
//! │  run() → try_acquire(queue) ──full──→ PoolError::Busy          │
//! │              ↓                                                 │
//! │          acquire(worker) ──timeout──→ PoolError::Timeout       │
//! │              ↓                                                 │
//! │          spawn_blocking(job)   [both permits held by the job]  │
//! │              ↓                                                 │
//! │          job done → permits released                           │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The queue semaphore has `workers + queue_depth` permits, so at most
//! `queue_depth` jobs wait while every worker is busy. Permits move into the
//! blocking closure: a caller that stops waiting does not free a worker slot
//! before the job it started has finished.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool queue is full")]
    Busy,

    #[error("No worker became available within {0} seconds")]
    Timeout(u64),

    #[error("Worker pool is shut down")]
    Closed,

    #[error("Worker task failed: {0}")]
    Join(String),
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub queue_depth: usize,
    pub active: usize,
    pub completed: usize,
    pub rejected: usize,
}

/// Bounded pool of blocking workers.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    workers: Arc<Semaphore>,
    queue: Arc<Semaphore>,
    worker_count: usize,
    queue_depth: usize,
    submit_timeout: Duration,
    active: AtomicUsize,
    completed: AtomicUsize,
    rejected: AtomicUsize,
}

impl WorkerPool {
    pub fn new(workers: usize, queue_depth: usize, submit_timeout: Duration) -> Self {
        let workers = workers.max(1);
        Self {
            inner: Arc::new(PoolInner {
                workers: Arc::new(Semaphore::new(workers)),
                queue: Arc::new(Semaphore::new(workers + queue_depth)),
                worker_count: workers,
                queue_depth,
                submit_timeout,
                active: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                rejected: AtomicUsize::new(0),
            }),
        }
    }

    /// Run `job` on a worker thread and wait for its result.
    pub async fn run<F, R>(&self, job: F) -> Result<R, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let inner = &self.inner;

        let queued = inner.queue.clone().try_acquire_owned().map_err(|_| {
            inner.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                workers = inner.worker_count,
                queue_depth = inner.queue_depth,
                "Worker pool full, rejecting job"
            );
            PoolError::Busy
        })?;

        let worker = match timeout(inner.submit_timeout, inner.workers.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                inner.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::Timeout(inner.submit_timeout.as_secs()));
            }
        };

        let guard = ActiveJob::start(self.inner.clone());

        tokio::task::spawn_blocking(move || {
            let _permits = (queued, worker);
            let _guard = guard;
            job()
        })
        .await
        .map_err(|e| PoolError::Join(e.to_string()))
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.inner.worker_count,
            queue_depth: self.inner.queue_depth,
            active: self.inner.active.load(Ordering::Relaxed),
            completed: self.inner.completed.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Counts a job as active until it is dropped, even if the job panics
struct ActiveJob(Arc<PoolInner>);

impl ActiveJob {
    fn start(inner: Arc<PoolInner>) -> Self {
        inner.active.fetch_add(1, Ordering::Relaxed);
        Self(inner)
    }
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::Relaxed);
        self.0.completed.fetch_add(1, Ordering::Relaxed);
    }
}
