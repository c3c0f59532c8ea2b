//! Core runtime components.
//!
//! This module contains the execution side of the crate: the worker pool
//! deferred work runs on, the runtime that owns it, and the thread-local
//! context that lets nested code reach the pool.
//!
//! It is responsible for:
//! - running deferred work off the caller's thread,
//! - scheduling continuations onto workers,
//! - configuring and shutting down the pool.

mod core;
mod pool;

pub(crate) mod builder;
pub(crate) mod context;

pub use self::core::Runtime;
pub use pool::Spawner;
