use crate::deferred::{Awaiter, Completer, Deferred};
use crate::error::Result;

/// Receives the outcome of a state machine.
///
/// `on_finished` is called exactly once per machine, with the final value or
/// the failure that ended it.
pub trait Observer<T>: Send + 'static {
    fn on_finished(self: Box<Self>, outcome: Result<T>);
}

impl<T, F> Observer<T> for F
where
    F: FnOnce(Result<T>) + Send + 'static,
{
    fn on_finished(self: Box<Self>, outcome: Result<T>) {
        (*self)(outcome)
    }
}

/// Fire-and-forget observer.
///
/// The caller that started the machine has already moved on, so a failure
/// can only be reported, not returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl<T: Send + 'static> Observer<T> for Detached {
    fn on_finished(self: Box<Self>, outcome: Result<T>) {
        match outcome {
            Ok(_) => tracing::debug!("detached machine finished"),
            Err(err) => tracing::error!(error = %err, "detached machine failed"),
        }
    }
}

/// Observer that makes a machine awaitable.
///
/// The paired [`Awaiter`] resolves with the machine's outcome, so the
/// machine can be waited on by the host or suspended on by another machine.
pub struct Promise<T> {
    completer: Completer<T>,
}

impl<T: Send + 'static> Promise<T> {
    pub fn new() -> (Self, Awaiter<T>) {
        let (deferred, completer) = Deferred::pending();
        (Self { completer }, deferred.awaiter())
    }
}

impl<T: Send + 'static> Observer<T> for Promise<T> {
    fn on_finished(self: Box<Self>, outcome: Result<T>) {
        self.completer.complete(outcome);
    }
}
