use super::observer::{Detached, Observer, Promise};
use super::state::{FINISHED, IDLE, RUNNING};
use super::step::{StateMachine, Step, StepIndex};
use crate::deferred::{Awaiter, Suspension};
use crate::error::{Error, InvalidState, Result, panic_message};
use crate::scheduler::{Inline, Scheduler};

use std::cell::UnsafeCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Starts and drives a [`StateMachine`].
///
/// The driver runs the first step on the calling thread. Whenever a step
/// awaits a computation that has not completed yet, the driver registers the
/// machine's resumption as a continuation through the configured
/// [`Scheduler`] and returns; the continuation re-enters the machine at the
/// recorded suspension point.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = Driver::new(machine)
///     .scheduler(runtime.spawner())
///     .start(|outcome| println!("{outcome:?}"));
/// ```
pub struct Driver<M: StateMachine> {
    machine: M,
    scheduler: Arc<dyn Scheduler>,
}

impl<M: StateMachine> Driver<M> {
    /// Creates a driver that resumes on the completing thread ([`Inline`]).
    pub fn new(machine: M) -> Self {
        Self {
            machine,
            scheduler: Arc::new(Inline),
        }
    }

    /// Sets the scheduler continuations are handed to.
    pub fn scheduler<S: Scheduler>(mut self, scheduler: S) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Starts the machine and returns once it first suspends or finishes.
    ///
    /// `observer` is told the outcome exactly once.
    pub fn start<O>(self, observer: O) -> MachineHandle
    where
        O: Observer<M::Output>,
    {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

        let instance = Arc::new(Instance {
            id,
            status: AtomicUsize::new(IDLE),
            cancelled: AtomicBool::new(false),
            frame: UnsafeCell::new(Frame {
                machine: self.machine,
                index: StepIndex::NotStarted,
                pending: None,
                observer: Some(Box::new(observer)),
            }),
            scheduler: self.scheduler,
        });

        tracing::debug!(machine = id, "machine started");
        instance.clone().resume();

        MachineHandle { control: instance }
    }

    /// Starts the machine without anyone to receive its outcome.
    pub fn start_detached(self) -> MachineHandle {
        self.start(Detached)
    }

    /// Starts the machine and returns an awaiter for its outcome.
    pub fn start_awaitable(self) -> (MachineHandle, Awaiter<M::Output>) {
        let (promise, awaiter) = Promise::new();
        (self.start(promise), awaiter)
    }
}

/// Handle to a started state machine.
///
/// Dropping the handle does **not** stop the machine.
#[derive(Clone)]
pub struct MachineHandle {
    control: Arc<dyn Control>,
}

impl MachineHandle {
    /// Process-unique identifier, as used in log records.
    pub fn id(&self) -> u64 {
        self.control.id()
    }

    /// Returns `true` once the outcome has been signaled.
    pub fn is_finished(&self) -> bool {
        self.control.is_finished()
    }

    /// Requests cancellation.
    ///
    /// The driver observes the request before running the next step and
    /// finishes with [`Error::Cancelled`]. A machine suspended on an awaiter
    /// observes it when that awaiter completes.
    pub fn cancel(&self) {
        self.control.cancel()
    }
}

impl fmt::Debug for MachineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineHandle")
            .field("id", &self.id())
            .field("finished", &self.is_finished())
            .finish()
    }
}

trait Control: Send + Sync {
    fn id(&self) -> u64;

    fn is_finished(&self) -> bool;

    fn cancel(&self);
}

/// Everything the driver mutates across resumptions.
struct Frame<M: StateMachine> {
    /// The machine, which is also its own snapshot of live locals.
    machine: M,

    /// Where the next resumption enters.
    index: StepIndex,

    /// What the machine is currently suspended on.
    pending: Option<Suspension>,

    /// Outer completion handle, taken when the outcome is signaled.
    observer: Option<Box<dyn Observer<M::Output>>>,
}

/// A running state machine instance.
struct Instance<M: StateMachine> {
    id: u64,

    /// Lifecycle state (`IDLE`, `RUNNING`, `FINISHED`).
    status: AtomicUsize,

    cancelled: AtomicBool,

    /// Only touched by the resumption that moved `status` to `RUNNING`.
    frame: UnsafeCell<Frame<M>>,

    scheduler: Arc<dyn Scheduler>,
}

// Safety: the frame is only accessed by the resumption that won the
// `IDLE -> RUNNING` transition, and `M` itself is `Send`.
unsafe impl<M: StateMachine> Send for Instance<M> {}
unsafe impl<M: StateMachine> Sync for Instance<M> {}

enum Advance<T> {
    Suspended(Suspension),
    Finished(Result<T>),
}

impl<M: StateMachine> Instance<M> {
    /// Re-enters the machine at its recorded step.
    ///
    /// Called once by [`Driver::start`] and once per completed suspension.
    fn resume(self: Arc<Self>) {
        if let Err(status) =
            self.status
                .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            if status == FINISHED {
                tracing::trace!(machine = self.id, "resume after finish ignored");
                return;
            }
            fatal(self.id, InvalidState::Overlap);
        }

        // Safety: the RUNNING state guarantees no other resumption touches
        // the frame until the status is released below.
        let frame = unsafe { &mut *self.frame.get() };

        match self.advance(frame) {
            Advance::Suspended(suspension) => {
                self.status.store(IDLE, Ordering::Release);

                let scheduler = self.scheduler.clone();
                let resumption = Resumption {
                    instance: Some(self),
                };
                suspension.on_complete(Box::new(move || {
                    scheduler.schedule(Box::new(move || resumption.run()));
                }));
            }
            Advance::Finished(outcome) => self.finish(frame, outcome),
        }
    }

    /// Finishes a suspended machine whose resumption was dropped unrun.
    fn abandon(&self) {
        if self
            .status
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        tracing::debug!(machine = self.id, "resumption dropped before running");

        // Safety: same exclusive access as in `resume`.
        let frame = unsafe { &mut *self.frame.get() };
        self.finish(frame, Err(Error::Shutdown));
    }

    /// Marks the machine finished and signals its observer.
    ///
    /// Must be called while holding the `RUNNING` status.
    fn finish(&self, frame: &mut Frame<M>, outcome: Result<M::Output>) {
        frame.index = StepIndex::Finished;
        frame.pending = None;
        let observer = frame.observer.take();

        self.status.store(FINISHED, Ordering::Release);

        match &outcome {
            Ok(_) => tracing::debug!(machine = self.id, "machine finished"),
            Err(err) => tracing::debug!(machine = self.id, error = %err, "machine failed"),
        }

        if let Some(observer) = observer {
            observer.on_finished(outcome);
        }
    }

    /// Runs steps until the machine suspends on an incomplete awaiter or
    /// finishes.
    fn advance(&self, frame: &mut Frame<M>) -> Advance<M::Output> {
        if let Some(pending) = frame.pending.take() {
            if !pending.is_ready() {
                fatal(self.id, InvalidState::Spurious(frame.index));
            }
            tracing::trace!(machine = self.id, step = %frame.index, "resumed");
        }

        loop {
            if self.cancelled.load(Ordering::Acquire) {
                return Advance::Finished(Err(Error::Cancelled));
            }

            let index = frame.index;
            tracing::trace!(machine = self.id, step = %index, "running step");

            let machine = &mut frame.machine;
            let result = panic::catch_unwind(AssertUnwindSafe(|| machine.step(index)));

            match result {
                Ok(Ok(Step::Await { resume_at, on })) => {
                    frame.index = StepIndex::At(resume_at);

                    if on.is_ready() {
                        tracing::trace!(machine = self.id, step = %frame.index, "already complete");
                        continue;
                    }

                    tracing::trace!(machine = self.id, step = %frame.index, "suspended");
                    frame.pending = Some(on.clone());
                    return Advance::Suspended(on);
                }
                Ok(Ok(Step::Complete(value))) => return Advance::Finished(Ok(value)),
                Ok(Err(err)) if err.is_fatal() => fatal(self.id, err),
                Ok(Err(err)) => return Advance::Finished(Err(err)),
                Err(payload) => {
                    return Advance::Finished(Err(Error::StepPanicked {
                        step: index,
                        message: panic_message(payload),
                    }));
                }
            }
        }
    }
}

impl<M: StateMachine> Control for Instance<M> {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_finished(&self) -> bool {
        self.status.load(Ordering::Acquire) == FINISHED
    }

    fn cancel(&self) {
        tracing::debug!(machine = self.id, "cancellation requested");
        self.cancelled.store(true, Ordering::Release);
    }
}

/// A scheduled resumption of a suspended machine.
///
/// Schedulers may drop a continuation without running it (a pool that shut
/// down with the job still queued, an event loop that is gone). Dropping an
/// unrun `Resumption` finishes the machine with [`Error::Shutdown`], so the
/// observer still hears exactly once.
struct Resumption<M: StateMachine> {
    instance: Option<Arc<Instance<M>>>,
}

impl<M: StateMachine> Resumption<M> {
    fn run(mut self) {
        if let Some(instance) = self.instance.take() {
            instance.resume();
        }
    }
}

impl<M: StateMachine> Drop for Resumption<M> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            instance.abandon();
        }
    }
}

/// Reports a protocol violation and aborts the resumption.
fn fatal(machine: u64, err: impl Into<Error>) -> ! {
    let err = err.into();
    tracing::error!(machine, error = %err, "state machine protocol violated");
    panic!("state machine {machine}: {err}");
}
