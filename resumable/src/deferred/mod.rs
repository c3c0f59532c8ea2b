//! Deferred computations and their awaiters.
//!
//! This module defines the leaf of the suspension protocol:
//! - [`Deferred`]: work running off the caller's thread, with a one-shot
//!   completion signal,
//! - [`Completer`]: the single writer of a deferred's result,
//! - [`Awaiter`]: the handle a state machine polls, registers on and
//!   retrieves the result from,
//! - [`Dispatch`]: where work runs ([`Immediate`] or the worker pool).

pub(crate) mod state;

mod awaiter;
mod core;
mod dispatch;

pub use awaiter::{Awaiter, Suspension};
pub use self::core::{Completer, Deferred};
pub use dispatch::{Dispatch, Immediate, dispatch, try_dispatch};

pub(crate) use dispatch::job;
