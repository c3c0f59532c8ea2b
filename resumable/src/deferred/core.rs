use super::state::{COMPLETED, PENDING, TAKEN};
use super::Awaiter;
use crate::error::{Error, InvalidState, Result};
use crate::scheduler::Continuation;

use std::cell::UnsafeCell;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Waker;

/// State shared between a deferred computation, its completer and its
/// awaiter.
///
/// The result cell has exactly one writer (the [`Completer`]) and exactly
/// one reader (the awaiter that wins the `COMPLETED -> TAKEN` transition).
pub(crate) struct Shared<T> {
    /// Lifecycle state (`PENDING`, `COMPLETED`, `TAKEN`).
    state: AtomicUsize,

    /// The value or captured failure.
    result: UnsafeCell<Option<Result<T>>>,

    /// Continuations waiting for completion.
    ///
    /// Registration checks the state while holding this lock, which closes
    /// the window between "not complete yet" and "pushed".
    continuations: Mutex<Vec<Continuation>>,

    /// Waker of the task polling the awaiter as a future, if any.
    ///
    /// Only the most recent poll's waker is kept.
    waker: Mutex<Option<Waker>>,
}

// Safety: the result cell is written once before `COMPLETED` is published
// and read once after the `COMPLETED -> TAKEN` transition, both of which are
// ordered by the state atomic.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn new() -> Self {
        Self {
            state: AtomicUsize::new(PENDING),
            result: UnsafeCell::new(None),
            continuations: Mutex::new(Vec::new()),
            waker: Mutex::new(None),
        }
    }

    /// Returns `true` once the result has been published.
    pub(crate) fn is_complete(&self) -> bool {
        self.state.load(Ordering::Acquire) != PENDING
    }

    /// Registers a continuation, or runs it right away if the work already
    /// finished.
    pub(crate) fn on_complete(&self, continuation: Continuation) {
        let mut continuations = self.continuations.lock().unwrap();

        if self.is_complete() {
            drop(continuations);
            continuation();
            return;
        }

        continuations.push(continuation);
    }

    /// Stores `waker` to be woken on completion, replacing any earlier one.
    ///
    /// Returns `true` if the work already finished, in which case nothing is
    /// stored.
    pub(crate) fn register_waker(&self, waker: &Waker) -> bool {
        let mut slot = self.waker.lock().unwrap();

        if self.is_complete() {
            return true;
        }

        if !matches!(slot.as_ref(), Some(current) if current.will_wake(waker)) {
            *slot = Some(waker.clone());
        }

        false
    }

    /// Moves the result out.
    pub(crate) fn take(&self) -> Result<T> {
        match self
            .state
            .compare_exchange(COMPLETED, TAKEN, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                // Safety: winning the transition grants exclusive access to
                // the cell, and the completer will never touch it again.
                let result = unsafe { (*self.result.get()).take() };
                result.unwrap_or(Err(Error::InvalidState(InvalidState::AlreadyTaken)))
            }
            Err(TAKEN) => Err(InvalidState::AlreadyTaken.into()),
            Err(_) => Err(InvalidState::NotReady.into()),
        }
    }

    /// Publishes the result and fires every registered continuation.
    fn complete(&self, result: Result<T>) {
        // Safety: only the single completer writes, and only while PENDING.
        unsafe {
            *self.result.get() = Some(result);
        }
        self.state.store(COMPLETED, Ordering::Release);

        let continuations = mem::take(&mut *self.continuations.lock().unwrap());
        tracing::trace!(continuations = continuations.len(), "deferred completed");

        for continuation in continuations {
            continuation();
        }

        if let Some(waker) = self.waker.lock().unwrap().take() {
            waker.wake();
        }
    }
}

/// A unit of work running independently of the caller.
///
/// A `Deferred` is the producer side's receipt: it can be queried and
/// observed, and converted into an [`Awaiter`] to retrieve the result.
pub struct Deferred<T> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Deferred<T> {
    /// Creates a pending deferred and the completer that resolves it.
    pub fn pending() -> (Self, Completer<T>) {
        let shared = Arc::new(Shared::new());
        let completer = Completer {
            shared: Some(shared.clone()),
        };

        (Self { shared }, completer)
    }

    /// Creates a deferred that has already completed with `result`.
    pub fn ready(result: Result<T>) -> Self {
        let (deferred, completer) = Self::pending();
        completer.complete(result);
        deferred
    }

    /// Returns `true` once the result or failure is available.
    pub fn is_complete(&self) -> bool {
        self.shared.is_complete()
    }

    /// Registers `callback` to run exactly once after completion.
    ///
    /// If the computation already completed, `callback` runs immediately on
    /// the calling thread.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.on_complete(Box::new(callback));
    }

    /// Returns the awaiter bound to this computation.
    pub fn awaiter(self) -> Awaiter<T> {
        Awaiter {
            shared: self.shared,
        }
    }
}

/// The single writer of a [`Deferred`]'s result.
///
/// Dropping a completer without calling [`complete`](Self::complete)
/// resolves the deferred with [`Error::Shutdown`], so awaiters never hang on
/// work that will not run.
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Completer<T> {
    /// Resolves the deferred and fires its continuations.
    pub fn complete(mut self, result: Result<T>) {
        if let Some(shared) = self.shared.take() {
            shared.complete(result);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            tracing::warn!("deferred dropped before completion");
            shared.complete(Err(Error::Shutdown));
        }
    }
}
