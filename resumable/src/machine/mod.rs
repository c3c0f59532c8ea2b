//! Hand-driven state machines.
//!
//! This module replaces what an `async fn` desugaring normally hides:
//! - [`StateMachine`]: the function body, split into steps, whose
//!   implementing type is the snapshot of every local crossing a suspension
//!   point,
//! - [`Step`] and [`StepIndex`]: suspension as an explicit return value,
//! - [`Driver`]: the resumption loop, including the already-complete fast
//!   path and top-level failure capture,
//! - [`Observer`]: the outer completion handle ([`Detached`], [`Promise`] or
//!   any closure),
//! - [`Pipeline`]: an N-step orchestration described as data.

pub(crate) mod state;

mod driver;
mod observer;
mod pipeline;
mod step;

pub use driver::{Driver, MachineHandle};
pub use observer::{Detached, Observer, Promise};
pub use pipeline::{Pipeline, Stage};
pub use step::{StateMachine, Step, StepIndex};
