use super::Job;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Shared handle to the pool's job queue.
pub(crate) type InjectorHandle = Arc<Injector>;

/// Global job queue of the worker pool.
///
/// Dispatched work and scheduled continuations are pushed here and picked
/// up by worker threads in FIFO order.
///
/// It also coordinates worker parking and waking using a condition
/// variable, allowing workers to sleep when no work is available.
pub(crate) struct Injector {
    /// Queue holding pending jobs.
    queue: Mutex<VecDeque<Job>>,

    /// Condition variable used to wake parked workers.
    condvar: Condvar,

    /// Indicates whether the pool is shutting down.
    shutdown: AtomicBool,
}

impl Injector {
    /// Creates a new empty injector.
    pub(crate) fn new() -> Self {
        Injector {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Signals shutdown and wakes all parked workers.
    ///
    /// After shutdown is initiated, pushes are rejected and workers exit.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Pushes a new job into the queue and wakes one parked worker.
    ///
    /// Returns the job back if the pool is shutting down.
    pub(crate) fn push(&self, job: Job) -> Result<(), Job> {
        let mut queue = self.queue.lock().unwrap();

        if self.is_shutdown() {
            return Err(job);
        }

        queue.push_back(job);
        drop(queue);

        self.condvar.notify_one();
        Ok(())
    }

    /// Takes the next job, parking the current worker until one is available
    /// or shutdown is signaled.
    ///
    /// The park uses a timed wait so a worker re-checks the shutdown flag
    /// periodically even if a notification is lost.
    pub(crate) fn next(&self) -> Option<Job> {
        let mut queue = self.queue.lock().unwrap();

        loop {
            if self.is_shutdown() {
                return None;
            }

            if let Some(job) = queue.pop_front() {
                return Some(job);
            }

            queue = self
                .condvar
                .wait_timeout(queue, Duration::from_millis(50))
                .unwrap()
                .0;
        }
    }

    /// Removes every job still queued.
    ///
    /// Used after the workers have exited; dropping the returned jobs
    /// resolves their deferreds with a shutdown error.
    pub(crate) fn drain(&self) -> Vec<Job> {
        self.queue.lock().unwrap().drain(..).collect()
    }
}
