//! # Resumable
//!
//! **Resumable** spells out, by hand, the state machine a compiler builds
//! for an asynchronous function: sequential-looking code that suspends while
//! a background computation runs, resumes with its result, and propagates a
//! failure back through the suspension chain.
//!
//! Instead of hiding the protocol behind `.await`, every moving part is a
//! first-class value:
//!
//! - A **deferred computation** runs work on a worker pool and exposes a
//!   one-shot completion signal
//! - An **awaiter** reports readiness, registers continuations and hands out
//!   the result or the captured failure
//! - A **scheduler** decides where a continuation resumes (inline, on the
//!   pool, or on a single-threaded event loop)
//! - A **driver** keeps the step index and snapshot of a machine, takes the
//!   fast path for already-finished work, and forwards failures to the
//!   machine's observer
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resumable::demo::CubeThenRoot;
//! use resumable::RuntimeBuilder;
//!
//! let runtime = RuntimeBuilder::new().worker_threads(2).build()?;
//! let machine = CubeThenRoot::new(42.0, runtime.spawner());
//!
//! let outcome = runtime.run(machine)?;
//! assert_eq!(outcome.cube, 74088.0);
//! ```
//!
//! ## Modules
//!
//! - [`deferred`]: Deferred computations, completers and awaiters
//! - [`machine`]: State machines, the driver and observers
//! - [`scheduler`]: Where continuations run
//! - [`demo`]: The two-step cube / square-root orchestration
//! - [`error`]: Error taxonomy

mod runtime;

pub mod deferred;
pub mod demo;
pub mod error;
pub mod machine;
pub mod scheduler;

pub use deferred::{
    Awaiter, Completer, Deferred, Dispatch, Immediate, Suspension, dispatch, try_dispatch,
};
pub use error::{BoxError, Error, InvalidState, Panicked, Result};
pub use machine::{
    Detached, Driver, MachineHandle, Observer, Pipeline, Promise, StateMachine, Step, StepIndex,
};
pub use runtime::builder::RuntimeBuilder;
pub use runtime::{Runtime, Spawner};
pub use scheduler::{EventLoop, Inline, LoopScheduler, Scheduler};
