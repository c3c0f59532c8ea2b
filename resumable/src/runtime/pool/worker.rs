use super::Spawner;
use super::injector::InjectorHandle;
use crate::runtime::context::enter_context;

/// A worker thread of the pool.
///
/// A `Worker` repeatedly takes jobs from the shared injector and runs them
/// with the runtime context installed, so dispatched work and continuations
/// can reach the pool through [`dispatch`](crate::dispatch).
///
/// The execution order is:
/// 1. Take the oldest queued job
/// 2. Park if no job is available
/// 3. Exit once shutdown is signaled
pub(crate) struct Worker {
    /// Unique identifier of the worker.
    id: usize,

    /// Handle to the pool's job queue.
    injector: InjectorHandle,
}

impl Worker {
    /// Creates a new worker.
    ///
    /// # Arguments
    ///
    /// * `id` - Worker identifier
    /// * `injector` - Handle to the pool's job queue
    pub(crate) fn new(id: usize, injector: InjectorHandle) -> Self {
        Self { id, injector }
    }

    /// Runs the worker loop until shutdown.
    pub(crate) fn run(&self) {
        tracing::debug!(worker = self.id, "worker started");

        let spawner = Spawner {
            injector: self.injector.clone(),
        };

        enter_context(spawner, || {
            while let Some(job) = self.injector.next() {
                job();
            }
        });

        tracing::debug!(worker = self.id, "worker stopped");
    }
}
