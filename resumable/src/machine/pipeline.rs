use super::step::{StateMachine, Step, StepIndex};
use crate::deferred::{Awaiter, Dispatch};
use crate::error::{BoxError, Error};

/// One deferred stage of a [`Pipeline`].
pub type Stage<T> = Box<dyn FnOnce(T) -> Result<T, BoxError> + Send + 'static>;

type Inspect<T> = Box<dyn FnMut(usize, &T) + Send + 'static>;

/// An N-step orchestration expressed as data.
///
/// Each stage runs as deferred work on the pipeline's dispatcher and feeds
/// its output to the next one. Suspension point `k` is "waiting for stage
/// `k`"; after retrieving stage `k`'s result the pipeline reports it to the
/// [`inspect`](Self::inspect) hook and dispatches stage `k + 1`.
///
/// # Examples
///
/// ```rust,ignore
/// let pipeline = Pipeline::new(2u64, runtime.spawner())
///     .stage(|x| Ok::<_, BoxError>(x * 10))
///     .stage(|x| Ok::<_, BoxError>(x + 1));
///
/// assert_eq!(runtime.run(pipeline)?, 21);
/// ```
pub struct Pipeline<T, D> {
    dispatcher: D,

    /// Input of stage 0, taken by the first step.
    seed: Option<T>,

    /// Stages not yet dispatched.
    stages: Vec<Option<Stage<T>>>,

    /// Awaiter of the stage currently running.
    pending: Option<Awaiter<T>>,

    inspect: Option<Inspect<T>>,
}

impl<T, D> Pipeline<T, D>
where
    T: Send + 'static,
    D: Dispatch,
{
    pub fn new(seed: T, dispatcher: D) -> Self {
        Self {
            dispatcher,
            seed: Some(seed),
            stages: Vec::new(),
            pending: None,
            inspect: None,
        }
    }

    /// Appends a stage.
    pub fn stage<F, E>(mut self, stage: F) -> Self
    where
        F: FnOnce(T) -> Result<T, E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.stages.push(Some(Box::new(move |value: T| -> Result<T, BoxError> {
            stage(value).map_err(Into::into)
        })));
        self
    }

    /// Sets a hook called with each stage's index and result, in order, as
    /// the pipeline retrieves them.
    pub fn inspect<F>(mut self, inspect: F) -> Self
    where
        F: FnMut(usize, &T) + Send + 'static,
    {
        self.inspect = Some(Box::new(inspect));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Dispatches stage `k` on `input` and suspends on it.
    fn launch(&mut self, k: usize, input: T) -> Result<Step<T>, Error> {
        let stage = self
            .stages
            .get_mut(k)
            .and_then(Option::take)
            .ok_or_else(|| StepIndex::At(k).unknown())?;

        let awaiter = self.dispatcher.try_dispatch(move || stage(input)).awaiter();
        let step = Step::suspend(k, &awaiter);
        self.pending = Some(awaiter);

        Ok(step)
    }
}

impl<T, D> StateMachine for Pipeline<T, D>
where
    T: Send + 'static,
    D: Dispatch,
{
    type Output = T;

    fn step(&mut self, index: StepIndex) -> Result<Step<T>, Error> {
        match index {
            StepIndex::NotStarted => {
                let seed = self.seed.take().ok_or_else(|| index.unknown())?;

                if self.stages.is_empty() {
                    return Ok(Step::Complete(seed));
                }

                self.launch(0, seed)
            }
            StepIndex::At(k) => {
                let awaiter = self.pending.take().ok_or_else(|| index.unknown())?;
                let value = awaiter.get_result()?;

                if let Some(inspect) = self.inspect.as_mut() {
                    inspect(k, &value);
                }

                if k + 1 < self.stages.len() {
                    self.launch(k + 1, value)
                } else {
                    Ok(Step::Complete(value))
                }
            }
            StepIndex::Finished => Err(index.unknown()),
        }
    }
}
