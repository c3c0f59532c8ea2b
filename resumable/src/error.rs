//! Error types shared by deferred computations and the step driver.

use crate::machine::StepIndex;

use std::any::Any;

use thiserror::Error;

/// Boxed error produced by deferred work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that can reach an awaiter or a machine's observer.
#[derive(Debug, Error)]
pub enum Error {
    /// The deferred work returned an error or panicked.
    #[error("deferred work failed: {0}")]
    WorkFailure(#[source] BoxError),

    /// The driver or an awaiter was used out of protocol.
    ///
    /// These are programming errors; the driver treats them as fatal.
    #[error("invalid state: {0}")]
    InvalidState(#[from] InvalidState),

    /// A step's synchronous code panicked.
    #[error("step {step} panicked: {message}")]
    StepPanicked { step: StepIndex, message: String },

    /// The state machine was cancelled before its next step.
    #[error("state machine cancelled")]
    Cancelled,

    /// The runtime shut down before the work could run.
    #[error("runtime is shut down")]
    Shutdown,
}

impl Error {
    /// Wraps any error into a [`Error::WorkFailure`].
    pub fn work<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::WorkFailure(err.into())
    }

    /// Returns `true` for errors that indicate a driver bug.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }

    /// Returns the work failure's source if it is of type `E`.
    pub fn downcast_work<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::WorkFailure(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidState {
    #[error("result retrieved before the computation completed")]
    NotReady,

    #[error("result was already taken")]
    AlreadyTaken,

    #[error("no step exists at {0}")]
    UnknownStep(StepIndex),

    #[error("resumed at {0} before the awaited computation completed")]
    Spurious(StepIndex),

    #[error("resumed while another resumption of the same machine was running")]
    Overlap,
}

/// A panic captured on a worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("work panicked: {message}")]
pub struct Panicked {
    pub message: String,
}

impl Panicked {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        Self {
            message: panic_message(payload),
        }
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
