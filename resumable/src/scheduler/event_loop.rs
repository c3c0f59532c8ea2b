use super::{Continuation, Scheduler};

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// A single-threaded continuation loop.
///
/// Continuations scheduled through a [`LoopScheduler`] are queued and only
/// run when the owning thread drives the loop with [`turn`](Self::turn),
/// [`run_until_idle`](Self::run_until_idle) or
/// [`run_until`](Self::run_until). Every resumption of a machine started on
/// this scheduler therefore happens on that one thread.
pub struct EventLoop {
    /// Sending half handed out to schedulers.
    sender: Sender<Continuation>,

    /// Queue drained by the host thread.
    receiver: Receiver<Continuation>,
}

/// Cloneable handle that queues continuations onto an [`EventLoop`].
#[derive(Clone)]
pub struct LoopScheduler {
    sender: Sender<Continuation>,
}

impl EventLoop {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// Returns a scheduler feeding this loop.
    pub fn scheduler(&self) -> LoopScheduler {
        LoopScheduler {
            sender: self.sender.clone(),
        }
    }

    /// Runs at most one queued continuation, waiting up to `timeout` for one
    /// to arrive.
    ///
    /// Returns `true` if a continuation ran.
    pub fn turn(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(continuation) => {
                continuation();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Runs every continuation that is already queued, without waiting.
    ///
    /// Returns the number of continuations that ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Ok(continuation) = self.receiver.try_recv() {
            continuation();
            ran += 1;
        }
        ran
    }

    /// Drives the loop until `done` returns `true` or `deadline` elapses.
    ///
    /// Returns whether `done` was satisfied.
    pub fn run_until(&self, deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();

        loop {
            if done() {
                return true;
            }

            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return done();
            }

            self.turn((deadline - elapsed).min(Duration::from_millis(10)));
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    /// Discards every continuation still queued without running it.
    ///
    /// A discarded machine resumption finishes its machine with
    /// [`Error::Shutdown`](crate::Error::Shutdown).
    fn drop(&mut self) {
        let mut discarded = 0;
        while let Ok(continuation) = self.receiver.try_recv() {
            drop(continuation);
            discarded += 1;
        }

        if discarded > 0 {
            tracing::debug!(discarded, "event loop dropped with queued continuations");
        }
    }
}

impl Scheduler for LoopScheduler {
    fn schedule(&self, continuation: Continuation) {
        // A rejected continuation comes back inside the error and is dropped
        // here, unrun.
        if self.sender.send(continuation).is_err() {
            tracing::warn!("event loop dropped; continuation discarded");
        }
    }
}
