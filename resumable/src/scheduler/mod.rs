//! Continuation scheduling.
//!
//! When a deferred computation completes, the continuation registered by a
//! suspended state machine has to run *somewhere*. A [`Scheduler`] decides
//! where:
//!
//! - [`Inline`] runs it on the thread that completed the computation,
//! - [`Spawner`](crate::Spawner) pushes it onto the worker pool,
//! - [`EventLoop`] queues it for a single host thread, mirroring a UI
//!   synchronization context.
//!
//! Every scheduler guarantees that a continuation never runs before the
//! completion that triggered it, and that each scheduled continuation runs
//! exactly once.

mod event_loop;

pub use event_loop::{EventLoop, LoopScheduler};

use std::sync::Arc;

/// A zero-argument action run when an awaited computation completes.
pub type Continuation = Box<dyn FnOnce() + Send + 'static>;

/// Decides where a continuation runs.
pub trait Scheduler: Send + Sync + 'static {
    /// Arranges for `continuation` to run exactly once.
    fn schedule(&self, continuation: Continuation);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule(&self, continuation: Continuation) {
        (**self).schedule(continuation)
    }
}

/// Runs continuations on the completing thread, immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Scheduler for Inline {
    fn schedule(&self, continuation: Continuation) {
        continuation();
    }
}
