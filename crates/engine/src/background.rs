//! Background queue for change notifications.
//!
//! A FIFO served by a single worker thread, so jobs run one at a time and
//! in submission order. The emitter of a notification never waits for the
//! index: `submit` only fails once the queue is shut down. A backlog past the
//! configured depth is logged, not refused, because refusing or applying out
//! of band would reorder changes.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, warn};

type Job = Box<dyn FnOnce() + Send>;

/// Why a job was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue has been shut down.
    #[error("notification queue is closed")]
    Closed,
}

/// Queue metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs waiting in the queue.
    pub queue_depth: usize,
    /// Jobs currently running (0 or 1).
    pub active_jobs: usize,
    /// Jobs completed since the queue was created.
    pub jobs_completed: u64,
    /// Submissions that found the backlog past the warning depth.
    pub overflowed: u64,
}

struct QueueInner {
    queue: Mutex<VecDeque<Job>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    queue_depth: AtomicUsize,
    active_jobs: AtomicUsize,
    warn_depth: usize,
    jobs_completed: AtomicU64,
    overflowed: AtomicU64,
}

/// Single-worker FIFO job queue.
pub struct NotificationQueue {
    inner: Arc<QueueInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationQueue {
    /// Start the queue and its worker thread (`mediasearch-notify`).
    ///
    /// A backlog longer than `warn_depth` is logged as a warning.
    pub fn start(warn_depth: usize) -> io::Result<Self> {
        let inner = Arc::new(QueueInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            queue_depth: AtomicUsize::new(0),
            active_jobs: AtomicUsize::new(0),
            warn_depth,
            jobs_completed: AtomicU64::new(0),
            overflowed: AtomicU64::new(0),
        });

        let inner_clone = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("mediasearch-notify".to_string())
            .spawn(move || worker_loop(&inner_clone))?;

        Ok(Self {
            inner,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queue a job behind every job submitted before it.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), QueueError> {
        let mut queue = self.inner.queue.lock();
        // Checked under the lock so a job can't slip in after the worker exits
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        queue.push_back(Box::new(job));
        self.inner.queue_depth.fetch_add(1, Ordering::Release);
        let backlog = queue.len();
        drop(queue);

        if backlog > self.inner.warn_depth {
            self.inner.overflowed.fetch_add(1, Ordering::Relaxed);
            // Once per crossing, not once per job
            if backlog == self.inner.warn_depth + 1 {
                warn!(
                    target: "mediasearch::engine",
                    backlog,
                    warn_depth = self.inner.warn_depth,
                    "Notification backlog past configured depth"
                );
            }
        }

        self.inner.work_ready.notify_one();
        Ok(())
    }

    /// Block until all queued and in-flight jobs have completed.
    ///
    /// The worker keeps running afterwards.
    pub fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while self.inner.queue_depth.load(Ordering::Acquire) > 0
            || self.inner.active_jobs.load(Ordering::Acquire) > 0
        {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Stop accepting jobs, run the ones already queued, join the worker.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        {
            // Hold the queue lock so a worker between its shutdown check and
            // its wait can't miss the notification.
            let _queue = self.inner.queue.lock();
            self.inner.shutdown.store(true, Ordering::Release);
            self.inner.work_ready.notify_all();
        }

        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// True once `shutdown` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Return a snapshot of queue metrics.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queue_depth: self.inner.queue_depth.load(Ordering::Relaxed),
            active_jobs: self.inner.active_jobs.load(Ordering::Relaxed),
            jobs_completed: self.inner.jobs_completed.load(Ordering::Relaxed),
            overflowed: self.inner.overflowed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for NotificationQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decrements `active_jobs` and wakes drain waiters on drop, even if the
/// job panicked.
struct ActiveJobGuard<'a> {
    inner: &'a QueueInner,
}

impl<'a> Drop for ActiveJobGuard<'a> {
    fn drop(&mut self) {
        self.inner.active_jobs.fetch_sub(1, Ordering::Release);
        self.inner.jobs_completed.fetch_add(1, Ordering::Relaxed);

        if self.inner.queue_depth.load(Ordering::Acquire) == 0 {
            let _queue = self.inner.queue.lock();
            self.inner.drain_cond.notify_all();
        }
    }
}

fn worker_loop(inner: &QueueInner) {
    loop {
        let job = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    // Both counters move under the lock so drain never sees
                    // the job in neither place.
                    inner.queue_depth.fetch_sub(1, Ordering::Release);
                    inner.active_jobs.fetch_add(1, Ordering::Release);
                    break job;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let _guard = ActiveJobGuard { inner };

        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
            error!(
                target: "mediasearch::engine",
                "notification job panicked: {:?}",
                e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
            );
        }
    }
}
