use super::context::enter_context;
use super::pool::{Spawner, WorkerPool};
use crate::deferred::{Deferred, Dispatch};
use crate::error::{BoxError, Result};
use crate::machine::{Driver, MachineHandle, Observer, StateMachine};

use std::io;

/// The main runtime handle.
///
/// `Runtime` is responsible for:
/// - owning the worker pool deferred work runs on,
/// - dispatching deferred computations,
/// - starting state machines,
/// - providing a synchronous entry point via [`run`](Self::run).
///
/// Dropping the runtime stops the workers; work still queued at that point
/// fails with [`Error::Shutdown`](crate::Error::Shutdown).
pub struct Runtime {
    /// Worker threads executing deferred work.
    pool: WorkerPool,

    /// Handle onto `pool`.
    spawner: Spawner,
}

impl Runtime {
    /// Creates a new runtime instance.
    ///
    /// # Arguments
    ///
    /// * `worker_threads` - Number of worker threads in the pool.
    /// * `thread_name` - Prefix of the worker thread names.
    pub(crate) fn new(worker_threads: usize, thread_name: &str) -> io::Result<Self> {
        let pool = WorkerPool::new(worker_threads, thread_name)?;
        let spawner = pool.spawner();

        tracing::debug!(worker_threads, "runtime started");

        Ok(Self { pool, spawner })
    }

    /// Returns a cloneable handle to the worker pool.
    ///
    /// The handle dispatches work and can serve as a machine's scheduler.
    pub fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }

    /// Dispatches infallible work onto the pool.
    pub fn dispatch<T, F>(&self, work: F) -> Deferred<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.spawner.dispatch(work)
    }

    /// Dispatches fallible work onto the pool.
    pub fn try_dispatch<T, E, F>(&self, work: F) -> Deferred<T>
    where
        T: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    {
        self.spawner.try_dispatch(work)
    }

    /// Starts `machine`, resuming it on whichever thread completes the
    /// awaited work.
    ///
    /// Returns as soon as the machine first suspends or finishes.
    pub fn start<M, O>(&self, machine: M, observer: O) -> MachineHandle
    where
        M: StateMachine,
        O: Observer<M::Output>,
    {
        self.enter(|| Driver::new(machine).start(observer))
    }

    /// Runs `machine` to completion, blocking the current thread.
    ///
    /// This is the synchronous entry point of the runtime (e.g. in `main`
    /// or tests).
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let value = runtime.run(pipeline)?;
    /// ```
    pub fn run<M>(&self, machine: M) -> Result<M::Output>
    where
        M: StateMachine,
    {
        let (_handle, awaiter) = self.enter(|| Driver::new(machine).start_awaitable());
        awaiter.wait()
    }

    /// Runs `f` with this runtime installed as the current context, so the
    /// free [`dispatch`](crate::dispatch) functions reach its pool.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        enter_context(self.spawner.clone(), f)
    }
}

impl Drop for Runtime {
    /// Shuts down the runtime.
    ///
    /// This performs the following steps:
    /// 1. Stops job submission and wakes every worker
    /// 2. Joins all worker threads
    /// 3. Fails the jobs that never ran
    fn drop(&mut self) {
        self.pool.shutdown();
        tracing::debug!("runtime shut down");
    }
}
