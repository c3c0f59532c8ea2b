//! The two-step cube/square-root orchestration.
//!
//! Written out by hand, the function this machine implements reads:
//!
//! ```rust,ignore
//! fn start(input: f64) {
//!     emit(Started);
//!     let number = input;
//!     let result1 = cube(number).await;
//!     emit(Cube(result1));
//!     let result2 = square_root(result1).await;
//!     emit(Root(result2));
//!     emit(Finished);
//! }
//! ```
//!
//! [`CubeThenRoot`] holds every local of that body in its snapshot and
//! splits it at the two awaits.

use crate::deferred::{Awaiter, Dispatch};
use crate::error;
use crate::machine::{StateMachine, Step, StepIndex};

use std::fmt;
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Failures of the demo computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DemoError {
    #[error("cannot take the square root of {0}")]
    NegativeRoot(f64),

    #[error("{0} computation unavailable")]
    Unavailable(&'static str),
}

/// Side effects emitted by the steps, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DemoEvent {
    Started,
    Cube(f64),
    Root(f64),
    Finished,
}

/// Final value of the orchestration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeRoot {
    pub cube: f64,
    pub root: f64,
}

/// The CPU-bound work the two suspension points await.
#[derive(Clone, Copy)]
pub struct Computations {
    pub cube: fn(f64) -> Result<f64, DemoError>,
    pub root: fn(f64) -> Result<f64, DemoError>,
}

impl Default for Computations {
    fn default() -> Self {
        Self {
            cube,
            root: square_root,
        }
    }
}

impl fmt::Debug for Computations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computations").finish_non_exhaustive()
    }
}

pub fn cube(x: f64) -> Result<f64, DemoError> {
    Ok(x.powi(3))
}

pub fn square_root(x: f64) -> Result<f64, DemoError> {
    if x < 0.0 {
        return Err(DemoError::NegativeRoot(x));
    }
    Ok(x.sqrt())
}

/// Locals whose lifetime crosses a suspension point.
#[derive(Debug, Default, Clone, Copy)]
struct Locals {
    number: f64,
    result1: f64,
    result2: f64,
}

type EventHook = Box<dyn FnMut(&DemoEvent) + Send + 'static>;

/// Awaits a deferred cube of `input`, then a deferred square root of that
/// cube.
pub struct CubeThenRoot<D> {
    dispatcher: D,
    input: f64,

    /// Artificial latency added to each computation.
    delay: Duration,

    computations: Computations,
    on_event: EventHook,

    locals: Locals,
    awaiter1: Option<Awaiter<f64>>,
    awaiter2: Option<Awaiter<f64>>,
}

impl<D: Dispatch> CubeThenRoot<D> {
    pub fn new(input: f64, dispatcher: D) -> Self {
        Self {
            dispatcher,
            input,
            delay: Duration::ZERO,
            computations: Computations::default(),
            on_event: Box::new(log_event),
            locals: Locals::default(),
            awaiter1: None,
            awaiter2: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn computations(mut self, computations: Computations) -> Self {
        self.computations = computations;
        self
    }

    /// Replaces the default event hook, which logs each event.
    pub fn on_event<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&DemoEvent) + Send + 'static,
    {
        self.on_event = Box::new(hook);
        self
    }

    fn emit(&mut self, event: DemoEvent) {
        (self.on_event)(&event);
    }

    fn compute(&self, work: fn(f64) -> Result<f64, DemoError>, input: f64) -> Awaiter<f64> {
        let delay = self.delay;

        self.dispatcher
            .try_dispatch(move || {
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                work(input)
            })
            .awaiter()
    }
}

impl<D: Dispatch> StateMachine for CubeThenRoot<D> {
    type Output = CubeRoot;

    fn step(&mut self, index: StepIndex) -> error::Result<Step<CubeRoot>> {
        match index {
            StepIndex::NotStarted => {
                self.emit(DemoEvent::Started);
                self.locals.number = self.input;

                let awaiter = self.compute(self.computations.cube, self.locals.number);
                let step = Step::suspend(0, &awaiter);
                self.awaiter1 = Some(awaiter);
                Ok(step)
            }
            StepIndex::At(0) => {
                let awaiter = self.awaiter1.take().ok_or_else(|| index.unknown())?;
                self.locals.result1 = awaiter.get_result()?;
                self.emit(DemoEvent::Cube(self.locals.result1));

                let awaiter = self.compute(self.computations.root, self.locals.result1);
                let step = Step::suspend(1, &awaiter);
                self.awaiter2 = Some(awaiter);
                Ok(step)
            }
            StepIndex::At(1) => {
                let awaiter = self.awaiter2.take().ok_or_else(|| index.unknown())?;
                self.locals.result2 = awaiter.get_result()?;
                self.emit(DemoEvent::Root(self.locals.result2));
                self.emit(DemoEvent::Finished);

                Ok(Step::Complete(CubeRoot {
                    cube: self.locals.result1,
                    root: self.locals.result2,
                }))
            }
            _ => Err(index.unknown()),
        }
    }
}

fn log_event(event: &DemoEvent) {
    match event {
        DemoEvent::Started => tracing::info!("start"),
        DemoEvent::Cube(value) => tracing::info!(result1 = *value, "cube ready"),
        DemoEvent::Root(value) => tracing::info!(result2 = *value, "square root ready"),
        DemoEvent::Finished => tracing::info!("end"),
    }
}
