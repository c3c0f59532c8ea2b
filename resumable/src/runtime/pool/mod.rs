//! Worker pool.
//!
//! The pool is where deferred work runs "off the caller's thread". It is
//! composed of:
//! - [`injector`]: the shared FIFO job queue with worker parking,
//! - [`worker`]: the threads draining that queue.
//!
//! [`Spawner`] is the cloneable handle through which work is dispatched and
//! continuations are scheduled onto the pool.

mod injector;
mod worker;

use crate::deferred::{self, Deferred, Dispatch};
use crate::error::BoxError;
use crate::scheduler::{Continuation, Scheduler};
use injector::{Injector, InjectorHandle};
use worker::Worker;

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A job executed by a worker thread.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads.
///
/// The `WorkerPool` is responsible for:
/// - spawning worker threads,
/// - handing jobs to them through the injector,
/// - managing orderly shutdown and thread joining.
pub(crate) struct WorkerPool {
    /// Job queue shared by all workers.
    injector: InjectorHandle,

    /// Join handles for worker threads.
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Creates a pool with `threads` named worker threads.
    ///
    /// # Arguments
    ///
    /// * `threads` - Number of worker threads
    /// * `name` - Prefix of the worker thread names
    pub(crate) fn new(threads: usize, name: &str) -> io::Result<Self> {
        let injector = Arc::new(Injector::new());
        let mut handles = Vec::with_capacity(threads);

        for id in 0..threads {
            let worker = Worker::new(id, injector.clone());

            let handle = thread::Builder::new()
                .name(format!("{name}-{id}"))
                .spawn(move || worker.run())?;

            handles.push(handle);
        }

        Ok(Self { injector, handles })
    }

    /// Returns a handle for dispatching onto this pool.
    pub(crate) fn spawner(&self) -> Spawner {
        Spawner {
            injector: self.injector.clone(),
        }
    }

    /// Signals all workers to stop, waits for them, then fails every job
    /// that never ran.
    pub(crate) fn shutdown(&mut self) {
        self.injector.shutdown();

        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }

        let abandoned = self.injector.drain();
        if !abandoned.is_empty() {
            tracing::debug!(jobs = abandoned.len(), "dropping jobs queued at shutdown");
        }
        drop(abandoned);
    }
}

/// Cloneable handle to a worker pool.
///
/// A `Spawner` both dispatches deferred work ([`Dispatch`]) and schedules
/// continuations ([`Scheduler`]) onto the pool. It stays valid after the
/// runtime is dropped; work dispatched then fails with
/// [`Error::Shutdown`](crate::Error::Shutdown).
#[derive(Clone)]
pub struct Spawner {
    pub(crate) injector: InjectorHandle,
}

impl Spawner {
    /// Returns `true` once the owning runtime has shut down.
    pub fn is_shutdown(&self) -> bool {
        self.injector.is_shutdown()
    }
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner")
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Dispatch for Spawner {
    fn try_dispatch<T, E, F>(&self, work: F) -> Deferred<T>
    where
        T: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let (deferred, completer) = Deferred::pending();

        // A rejected job is dropped here, which resolves the deferred with
        // a shutdown error through the completer.
        if self
            .injector
            .push(Box::new(deferred::job(completer, work)))
            .is_err()
        {
            tracing::debug!("work dispatched after shutdown");
        }

        deferred
    }
}

impl Scheduler for Spawner {
    fn schedule(&self, continuation: Continuation) {
        if let Err(continuation) = self.injector.push(continuation) {
            // The pool is gone; resume on the completing thread instead so
            // the machine can still observe the shutdown and finish.
            tracing::debug!("pool shut down; running continuation inline");
            continuation();
        }
    }
}
