use crate::runtime::pool::Spawner;

use std::cell::RefCell;

thread_local! {
    /// Thread-local handle to the current worker pool.
    ///
    /// This is set on every worker thread and inside
    /// [`Runtime::enter`](crate::Runtime::enter), and lets
    /// [`dispatch`](crate::dispatch) reach the pool without explicit
    /// parameter passing.
    static CURRENT_SPAWNER: RefCell<Option<Spawner>> = const { RefCell::new(None) };
}

/// Enters the runtime execution context for the current thread.
///
/// This function temporarily installs `spawner` as the current pool for the
/// duration of the closure `f`. After the closure completes, the previous
/// context is restored.
///
/// # Arguments
///
/// * `spawner` - Handle to the worker pool.
/// * `f` - Closure executed inside the runtime context.
pub(crate) fn enter_context<R>(spawner: Spawner, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_SPAWNER.with(|cell| cell.replace(Some(spawner)));

    let out = f();

    CURRENT_SPAWNER.with(|cell| cell.replace(previous));

    out
}

/// Returns the spawner installed on the current thread, if any.
pub(crate) fn current_spawner() -> Option<Spawner> {
    CURRENT_SPAWNER.with(|cell| cell.borrow().clone())
}
