use super::Runtime;

use std::io;
use std::thread;

/// Builder for configuring and creating a runtime.
///
/// `RuntimeBuilder` allows customizing runtime parameters before
/// constructing the runtime: the number of worker threads deferred work
/// runs on, and the name prefix given to those threads.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = RuntimeBuilder::new()
///     .worker_threads(4)
///     .thread_name("cube-worker")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    /// Number of worker threads in the pool.
    worker_threads: usize,

    /// Prefix of the worker thread names.
    thread_name: String,
}

impl RuntimeBuilder {
    /// Creates a new `RuntimeBuilder` with default configuration.
    ///
    /// By default, the number of worker threads is set to the number
    /// of available logical CPUs, falling back to `1` if unavailable.
    pub fn new() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            thread_name: "resumable-worker".to_string(),
        }
    }

    /// Sets the number of worker threads used by the runtime.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = n;
        self
    }

    /// Sets the prefix of worker thread names; each thread appends its id.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Builds the runtime with the configured options.
    ///
    /// Fails if a worker thread cannot be spawned.
    pub fn build(self) -> io::Result<Runtime> {
        Runtime::new(self.worker_threads, &self.thread_name)
    }
}

impl Default for RuntimeBuilder {
    /// Creates a default `RuntimeBuilder`.
    fn default() -> Self {
        Self::new()
    }
}
