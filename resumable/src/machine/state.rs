/// No resumption is running.
///
/// The machine is either not started or suspended on an awaiter.
pub(crate) const IDLE: usize = 0;

/// A resumption is executing steps.
///
/// Grants exclusive access to the machine's frame.
pub(crate) const RUNNING: usize = 1;

/// The outcome has been signaled.
///
/// Any later resumption is ignored.
pub(crate) const FINISHED: usize = 2;
