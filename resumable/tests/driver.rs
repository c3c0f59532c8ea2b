mod common;

use common::{init_test_logging, shared_runtime};
use resumable::demo::{CubeRoot, CubeThenRoot};
use resumable::{
    Awaiter, Deferred, Dispatch, Driver, Error, EventLoop, Immediate, InvalidState, Result,
    RuntimeBuilder, Spawner, StateMachine, Step, StepIndex,
};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

/// Suspends on an awaiter it does not own, then records whether it resumed.
struct Gate {
    awaiter: Option<Awaiter<u32>>,
    resumed: Arc<AtomicBool>,
}

impl StateMachine for Gate {
    type Output = u32;

    fn step(&mut self, index: StepIndex) -> Result<Step<u32>> {
        match index {
            StepIndex::NotStarted => {
                let awaiter = self.awaiter.as_ref().ok_or_else(|| index.unknown())?;
                Ok(Step::suspend(0, awaiter))
            }
            StepIndex::At(0) => {
                self.resumed.store(true, Ordering::SeqCst);
                let awaiter = self.awaiter.take().ok_or_else(|| index.unknown())?;
                Ok(Step::Complete(awaiter.get_result()?))
            }
            _ => Err(index.unknown()),
        }
    }
}

/// Awaits an already-complete computation, then claims a suspension point it
/// does not implement.
struct Phantom;

impl StateMachine for Phantom {
    type Output = ();

    fn step(&mut self, index: StepIndex) -> Result<Step<()>> {
        match index {
            StepIndex::NotStarted => {
                let awaiter = Immediate.dispatch(|| ()).awaiter();
                Ok(Step::suspend(7, &awaiter))
            }
            _ => Err(index.unknown()),
        }
    }
}

/// Fails synchronously in its first step.
struct Refuses {
    later_steps: Arc<AtomicUsize>,
}

impl StateMachine for Refuses {
    type Output = ();

    fn step(&mut self, index: StepIndex) -> Result<Step<()>> {
        match index {
            StepIndex::NotStarted => Err(Error::work("refused")),
            _ => {
                self.later_steps.fetch_add(1, Ordering::SeqCst);
                Ok(Step::Complete(()))
            }
        }
    }
}

struct Panics;

impl StateMachine for Panics {
    type Output = ();

    fn step(&mut self, _: StepIndex) -> Result<Step<()>> {
        panic!("step exploded");
    }
}

/// Awaits another machine's outcome.
struct Outer {
    spawner: Spawner,
    inner: Option<Awaiter<CubeRoot>>,
}

impl StateMachine for Outer {
    type Output = f64;

    fn step(&mut self, index: StepIndex) -> Result<Step<f64>> {
        match index {
            StepIndex::NotStarted => {
                let machine = CubeThenRoot::new(3.0, self.spawner.clone())
                    .delay(Duration::from_millis(10));
                let (_, awaiter) = Driver::new(machine).start_awaitable();
                let step = Step::suspend(0, &awaiter);
                self.inner = Some(awaiter);
                Ok(step)
            }
            StepIndex::At(0) => {
                let inner = self.inner.take().ok_or_else(|| index.unknown())?;
                let outcome = inner.get_result()?;
                Ok(Step::Complete(outcome.cube + outcome.root))
            }
            _ => Err(index.unknown()),
        }
    }
}

/// Runs `steps` deferred increments and flags any overlapping resumption.
struct Guarded {
    spawner: Spawner,
    steps: usize,
    total: u64,
    pending: Option<Awaiter<u64>>,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
}

impl Guarded {
    fn launch(&mut self, k: usize) -> Step<u64> {
        let awaiter = self
            .spawner
            .dispatch(move || {
                thread::sleep(Duration::from_micros(200));
                k as u64
            })
            .awaiter();
        let step = Step::suspend(k, &awaiter);
        self.pending = Some(awaiter);
        step
    }
}

impl StateMachine for Guarded {
    type Output = u64;

    fn step(&mut self, index: StepIndex) -> Result<Step<u64>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_micros(50));

        let step = match index {
            StepIndex::NotStarted => self.launch(0),
            StepIndex::At(k) => {
                let awaiter = self.pending.take().ok_or_else(|| index.unknown())?;
                self.total += awaiter.get_result()?;
                if k + 1 < self.steps {
                    self.launch(k + 1)
                } else {
                    Step::Complete(self.total)
                }
            }
            StepIndex::Finished => return Err(index.unknown()),
        };

        self.busy.store(false, Ordering::SeqCst);
        Ok(step)
    }
}

#[test]
fn test_machine_resumes_when_awaited_work_completes() {
    init_test_logging();
    let (deferred, completer) = Deferred::pending();
    let resumed = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let machine = Gate {
        awaiter: Some(deferred.awaiter()),
        resumed: resumed.clone(),
    };
    let handle = Driver::new(machine).start(move |outcome: Result<u32>| {
        tx.send(outcome).unwrap();
    });

    assert!(!handle.is_finished());
    assert!(!resumed.load(Ordering::SeqCst));

    completer.complete(Ok(11));

    assert_eq!(rx.try_recv().unwrap().unwrap(), 11);
    assert!(resumed.load(Ordering::SeqCst));
    assert!(handle.is_finished());
}

#[test]
fn test_cancel_stops_before_next_step() {
    let (deferred, completer) = Deferred::pending();
    let resumed = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let machine = Gate {
        awaiter: Some(deferred.awaiter()),
        resumed: resumed.clone(),
    };
    let handle = Driver::new(machine).start(move |outcome: Result<u32>| {
        tx.send(outcome).unwrap();
    });

    handle.cancel();
    assert!(!handle.is_finished());

    completer.complete(Ok(1));

    assert!(matches!(rx.try_recv().unwrap(), Err(Error::Cancelled)));
    assert!(!resumed.load(Ordering::SeqCst));
    assert!(handle.is_finished());
}

#[test]
#[should_panic(expected = "no step exists at suspension 7")]
fn test_unknown_step_is_fatal() {
    Driver::new(Phantom).start_detached();
}

#[test]
fn test_step_failure_finishes_machine() {
    let later_steps = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    let machine = Refuses {
        later_steps: later_steps.clone(),
    };
    let handle = Driver::new(machine).start(move |outcome: Result<()>| {
        tx.send(outcome).unwrap();
    });

    let err = rx.try_recv().unwrap().unwrap_err();
    assert_eq!(err.to_string(), "deferred work failed: refused");
    assert!(handle.is_finished());
    assert_eq!(later_steps.load(Ordering::SeqCst), 0);
}

#[test]
fn test_step_panic_is_reported_to_observer() {
    let (tx, rx) = mpsc::channel();

    Driver::new(Panics).start(move |outcome: Result<()>| {
        tx.send(outcome).unwrap();
    });

    match rx.try_recv().unwrap() {
        Err(Error::StepPanicked { step, message }) => {
            assert_eq!(step, StepIndex::NotStarted);
            assert_eq!(message, "step exploded");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_machine_can_await_another_machine() {
    let rt = shared_runtime();

    let outer = Outer {
        spawner: rt.spawner(),
        inner: None,
    };

    let value = rt.run(outer).unwrap();

    assert!((value - (27.0 + 27f64.sqrt())).abs() < 1e-9);
}

#[test]
fn test_observer_fires_exactly_once_per_instance() {
    let rt = shared_runtime();
    let finished = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    for i in 0..20 {
        let finished = finished.clone();
        let tx = tx.clone();
        let observer = move |outcome: Result<CubeRoot>| {
            finished.fetch_add(1, Ordering::SeqCst);
            tx.send(outcome.is_ok()).unwrap();
        };

        if i % 2 == 0 {
            Driver::new(CubeThenRoot::new(i as f64, Immediate)).start(observer);
        } else {
            let machine = CubeThenRoot::new(i as f64, rt.spawner()).delay(Duration::from_millis(1));
            Driver::new(machine).scheduler(rt.spawner()).start(observer);
        }
    }

    for _ in 0..20 {
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }
    thread::sleep(Duration::from_millis(50));

    assert_eq!(finished.load(Ordering::SeqCst), 20);
}

#[test]
fn test_resumptions_never_overlap_across_instances() {
    let rt = shared_runtime();
    let overlaps = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    for _ in 0..16 {
        let machine = Guarded {
            spawner: rt.spawner(),
            steps: 8,
            total: 0,
            pending: None,
            busy: Arc::new(AtomicBool::new(false)),
            overlaps: overlaps.clone(),
        };
        let tx = tx.clone();

        Driver::new(machine)
            .scheduler(rt.spawner())
            .start(move |outcome: Result<u64>| {
                tx.send(outcome).unwrap();
            });
    }

    for _ in 0..16 {
        let total = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!(total, (0..8).sum::<u64>());
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

/// Starts a `Gate` suspended on a fresh pending deferred, counting observer
/// calls and forwarding the outcome.
fn gated<S: resumable::Scheduler>(
    scheduler: S,
) -> (
    resumable::Completer<u32>,
    resumable::MachineHandle,
    Arc<AtomicBool>,
    Arc<AtomicUsize>,
    mpsc::Receiver<Result<u32>>,
) {
    let (deferred, completer) = Deferred::pending();
    let resumed = Arc::new(AtomicBool::new(false));
    let fired = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    let machine = Gate {
        awaiter: Some(deferred.awaiter()),
        resumed: resumed.clone(),
    };

    let counter = fired.clone();
    let handle = Driver::new(machine)
        .scheduler(scheduler)
        .start(move |outcome: Result<u32>| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        });

    (completer, handle, resumed, fired, rx)
}

#[test]
fn test_resumption_queued_at_pool_shutdown_finishes_machine() {
    let rt = RuntimeBuilder::new().worker_threads(1).build().unwrap();

    // Keep the only worker busy so the resumption stays queued.
    let (started_tx, started_rx) = mpsc::channel();
    let _blocker = rt.dispatch(move || {
        let _ = started_tx.send(());
        thread::sleep(Duration::from_millis(100));
    });
    started_rx.recv().unwrap();

    let (completer, handle, resumed, fired, rx) = gated(rt.spawner());
    assert!(!handle.is_finished());

    completer.complete(Ok(5));
    drop(rt);

    assert!(matches!(rx.try_recv().unwrap(), Err(Error::Shutdown)));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(handle.is_finished());
    assert!(!resumed.load(Ordering::SeqCst));
}

#[test]
fn test_resumption_rejected_by_dropped_event_loop_finishes_machine() {
    let event_loop = EventLoop::new();
    let (completer, handle, resumed, fired, rx) = gated(event_loop.scheduler());

    drop(event_loop);
    completer.complete(Ok(5));

    assert!(matches!(rx.try_recv().unwrap(), Err(Error::Shutdown)));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(handle.is_finished());
    assert!(!resumed.load(Ordering::SeqCst));
}

#[test]
fn test_resumption_queued_on_dropped_event_loop_finishes_machine() {
    let event_loop = EventLoop::new();
    let (completer, handle, resumed, fired, rx) = gated(event_loop.scheduler());

    completer.complete(Ok(5));
    assert!(!handle.is_finished());

    drop(event_loop);

    assert!(matches!(rx.try_recv().unwrap(), Err(Error::Shutdown)));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(handle.is_finished());
    assert!(!resumed.load(Ordering::SeqCst));
}

#[test]
fn test_event_loop_resumption_still_runs_when_driven() {
    let event_loop = EventLoop::new();
    let (completer, handle, resumed, fired, rx) = gated(event_loop.scheduler());

    completer.complete(Ok(5));
    assert_eq!(event_loop.run_until_idle(), 1);
    drop(event_loop);

    assert_eq!(rx.try_recv().unwrap().unwrap(), 5);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(handle.is_finished());
    assert!(resumed.load(Ordering::SeqCst));
}

#[test]
fn test_only_protocol_violations_are_fatal() {
    assert!(Error::from(InvalidState::Overlap).is_fatal());
    assert!(Error::from(InvalidState::UnknownStep(StepIndex::At(3))).is_fatal());

    assert!(!Error::Shutdown.is_fatal());
    assert!(!Error::Cancelled.is_fatal());
    assert!(!Error::work("refused").is_fatal());
}
