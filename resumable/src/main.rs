use resumable::demo::{Computations, CubeThenRoot, DemoError, DemoEvent};
use resumable::{Driver, RuntimeBuilder};

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

fn unavailable(_: f64) -> Result<f64, DemoError> {
    Err(DemoError::Unavailable("cube"))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let fail = env::args().any(|arg| arg == "--fail");

    let runtime = match RuntimeBuilder::new().worker_threads(2).build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut computations = Computations::default();
    if fail {
        computations.cube = unavailable;
    }

    let machine = CubeThenRoot::new(42.0, runtime.spawner())
        .delay(Duration::from_secs(1))
        .computations(computations)
        .on_event(|event| match event {
            DemoEvent::Started => println!("Start"),
            DemoEvent::Cube(value) => println!("Result1: {value}"),
            DemoEvent::Root(value) => println!("Result2: {value}"),
            DemoEvent::Finished => println!("End"),
        });

    // Returns at the first suspension; the host only blocks on the outcome.
    let (handle, outcome) = Driver::new(machine).start_awaitable();
    tracing::debug!(machine = handle.id(), "orchestration running in the background");

    match outcome.wait() {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("orchestration failed: {err}");
            ExitCode::FAILURE
        }
    }
}
