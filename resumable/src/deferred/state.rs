/// The work has not finished yet.
///
/// The result cell is empty and owned by the completer.
pub(crate) const PENDING: usize = 0;

/// The work has finished and the result is stored.
///
/// Published with `Release`; readers must observe it with `Acquire`
/// before touching the result cell.
pub(crate) const COMPLETED: usize = 1;

/// The result has been moved out by an awaiter.
///
/// The deferred is inert from here on.
pub(crate) const TAKEN: usize = 2;
