use super::core::Shared;
use crate::error::{Error, Result};
use crate::scheduler::Continuation;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A non-blocking handle to one deferred computation.
///
/// The driver uses an awaiter in three moves: ask [`is_ready`](Self::is_ready),
/// register a continuation if not, and call [`get_result`](Self::get_result)
/// once resumed.
pub struct Awaiter<T> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Awaiter<T> {
    /// Returns `true` if the computation has completed.
    ///
    /// Never blocks.
    pub fn is_ready(&self) -> bool {
        self.shared.is_complete()
    }

    /// Registers `continuation` to run exactly once after completion.
    pub fn on_completion<F>(&self, continuation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.on_complete(Box::new(continuation));
    }

    /// Retrieves the value, or re-raises the captured failure.
    ///
    /// Returns [`InvalidState::NotReady`](crate::InvalidState::NotReady) if
    /// called before completion, and
    /// [`InvalidState::AlreadyTaken`](crate::InvalidState::AlreadyTaken) on a
    /// second call.
    pub fn get_result(&self) -> Result<T> {
        self.shared.take()
    }

    /// Returns a type-erased handle the driver can suspend on.
    pub fn suspension(&self) -> Suspension {
        Suspension {
            signal: self.shared.clone(),
        }
    }

    /// Blocks the current thread until the computation completes.
    pub fn wait(self) -> Result<T> {
        let (transmitter, receiver) = mpsc::channel();

        self.on_completion(move || {
            let _ = transmitter.send(());
        });

        receiver.recv().map_err(|_| Error::Shutdown)?;
        self.get_result()
    }
}

impl<T> fmt::Debug for Awaiter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Awaiter")
            .field("ready", &self.shared.is_complete())
            .finish()
    }
}

impl<T: Send + 'static> Future for Awaiter<T> {
    type Output = Result<T>;

    /// Polls the awaiter.
    ///
    /// Each pending poll replaces the stored waker rather than adding one,
    /// and completion is re-checked under the same lock the completer takes
    /// to wake, so no wake-up is missed.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.shared.register_waker(cx.waker()) {
            return Poll::Ready(self.get_result());
        }

        Poll::Pending
    }
}

/// Completion signal of a deferred computation, independent of its value
/// type.
pub(crate) trait Signal: Send + Sync {
    fn is_complete(&self) -> bool;

    fn on_complete(&self, continuation: Continuation);
}

impl<T: Send> Signal for Shared<T> {
    fn is_complete(&self) -> bool {
        Shared::is_complete(self)
    }

    fn on_complete(&self, continuation: Continuation) {
        Shared::on_complete(self, continuation)
    }
}

/// What a suspended state machine is waiting on.
///
/// Obtained from [`Awaiter::suspension`]. The machine keeps the typed
/// awaiter in its snapshot; the driver only needs to know when to resume.
#[derive(Clone)]
pub struct Suspension {
    signal: Arc<dyn Signal>,
}

impl Suspension {
    pub fn is_ready(&self) -> bool {
        self.signal.is_complete()
    }

    pub(crate) fn on_complete(&self, continuation: Continuation) {
        self.signal.on_complete(continuation)
    }
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension")
            .field("ready", &self.is_ready())
            .finish()
    }
}
