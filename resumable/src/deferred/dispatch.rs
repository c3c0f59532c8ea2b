use super::core::{Completer, Deferred};
use crate::error::{BoxError, Error, Panicked, Result};
use crate::runtime::context;

use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};

/// Somewhere deferred work can run.
///
/// Implemented by [`Spawner`](crate::Spawner), which runs work on the worker
/// pool, and by [`Immediate`], which runs it in place.
pub trait Dispatch: Send + 'static {
    /// Starts fallible work and returns its deferred result.
    fn try_dispatch<T, E, F>(&self, work: F) -> Deferred<T>
    where
        T: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static;

    /// Starts infallible work and returns its deferred result.
    fn dispatch<T, F>(&self, work: F) -> Deferred<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.try_dispatch(move || Ok::<T, Infallible>(work()))
    }
}

/// Runs work synchronously on the calling thread.
///
/// Every deferred it returns is already complete, which makes the driver
/// take its fast path.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Dispatch for Immediate {
    fn try_dispatch<T, E, F>(&self, work: F) -> Deferred<T>
    where
        T: Send + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    {
        Deferred::ready(run_work(work))
    }
}

/// Runs `work`, capturing both returned errors and panics.
pub(crate) fn run_work<T, E, F>(work: F) -> Result<T>
where
    E: Into<BoxError>,
    F: FnOnce() -> std::result::Result<T, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Error::work(err)),
        Err(payload) => Err(Error::work(Panicked::from_payload(payload))),
    }
}

/// Wraps `work` into a job that resolves `completer` when run.
pub(crate) fn job<T, E, F>(completer: Completer<T>, work: F) -> impl FnOnce() + Send + 'static
where
    T: Send + 'static,
    E: Into<BoxError>,
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
{
    move || completer.complete(run_work(work))
}

/// Dispatches infallible work onto the current runtime.
///
/// # Panics
///
/// Panics if called outside the context of a runtime.
pub fn dispatch<T, F>(work: F) -> Deferred<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    context::current_spawner()
        .expect("dispatch must be called within the context of a runtime")
        .dispatch(work)
}

/// Dispatches fallible work onto the current runtime.
///
/// # Panics
///
/// Panics if called outside the context of a runtime.
pub fn try_dispatch<T, E, F>(work: F) -> Deferred<T>
where
    T: Send + 'static,
    E: Into<BoxError>,
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
{
    context::current_spawner()
        .expect("try_dispatch must be called within the context of a runtime")
        .try_dispatch(work)
}
