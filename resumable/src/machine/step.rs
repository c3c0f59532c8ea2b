use crate::deferred::{Awaiter, Suspension};
use crate::error::{Error, InvalidState};

use std::fmt;

/// Position of a state machine between resumptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepIndex {
    /// The machine has not run any code yet.
    NotStarted,

    /// The machine is suspended at (or resuming from) suspension point `k`.
    At(usize),

    /// The machine has signaled its outcome and will not run again.
    Finished,
}

impl StepIndex {
    /// Error for a machine asked to run a step it does not define.
    pub fn unknown(self) -> Error {
        Error::InvalidState(InvalidState::UnknownStep(self))
    }
}

impl fmt::Display for StepIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepIndex::NotStarted => f.write_str("not-started"),
            StepIndex::At(k) => write!(f, "suspension {k}"),
            StepIndex::Finished => f.write_str("finished"),
        }
    }
}

/// What one step of a state machine ended with.
#[derive(Debug)]
pub enum Step<T> {
    /// The machine is done and produced `T`.
    Complete(T),

    /// The machine awaits `on` and resumes at suspension point `resume_at`.
    Await { resume_at: usize, on: Suspension },
}

impl<T> Step<T> {
    /// Suspends on `awaiter`, resuming at `resume_at`.
    pub fn suspend<U: Send + 'static>(resume_at: usize, awaiter: &Awaiter<U>) -> Self {
        Step::Await {
            resume_at,
            on: awaiter.suspension(),
        }
    }
}

/// A hand-written asynchronous function body.
///
/// The implementing type *is* the snapshot: every local whose lifetime
/// crosses a suspension point, plus the awaiters it is suspended on, must be
/// a field. The driver calls [`step`](Self::step) with
/// [`StepIndex::NotStarted`] first and with [`StepIndex::At`] after each
/// suspension, never with [`StepIndex::Finished`].
///
/// Returning `Err` finishes the machine and hands the error to the
/// observer; steps after the failing one never run.
pub trait StateMachine: Send + 'static {
    /// Final value of the machine.
    type Output: Send + 'static;

    /// Runs the synchronous code belonging to `index` until the machine
    /// completes or awaits.
    fn step(&mut self, index: StepIndex) -> Result<Step<Self::Output>, Error>;
}
