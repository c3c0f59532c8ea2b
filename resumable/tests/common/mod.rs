//! Shared helpers for the integration tests.

#![allow(dead_code)]

use resumable::{Runtime, RuntimeBuilder};

use std::future::Future;
use std::pin::pin;
use std::sync::{Arc, Mutex, Once, OnceLock};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

static INIT_LOGGING: Once = Once::new();

/// Installs a trace-level subscriber writing through the test harness.
///
/// Safe to call multiple times; only the first call has an effect.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_thread_names(true)
            .with_ansi(false)
            .try_init();
    });
}

/// A runtime shared by every test in one binary.
pub fn shared_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();

    RUNTIME.get_or_init(|| {
        RuntimeBuilder::new()
            .worker_threads(4)
            .thread_name("shared-worker")
            .build()
            .expect("failed to build shared runtime")
    })
}

/// Thread-safe, cloneable event log.
#[derive(Clone)]
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, event: T) {
        self.events.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.events.lock().unwrap().clone()
    }
}

struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }
}

/// Minimal executor polling `future` on the current thread.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);

    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(value) => return value,
            Poll::Pending => thread::park(),
        }
    }
}
