//! Pool runner
//!
//! Bounded fan-out with order-preserving results.
//!
//! - [`pool`] interleaves tasks on the calling task with `FuturesUnordered`;
//!   tasks need not be `Send` or `'static`.
//! - [`pool_spawned`] puts each task on the tokio runtime through a
//!   `JoinSet`, so tasks can make progress on several worker threads.
//!
//! Both keep at most `concurrency` tasks in flight, start the next task in
//! list order as soon as a slot frees up, and write every result into the
//! slot matching its input position. After the first failure nothing new is
//! started; tasks already in flight are awaited and their outcomes dropped.

use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument, warn};

use crate::config::Concurrency;
use crate::error::FlowError;
use crate::event_log::{Combinator, Recorder};
use crate::task::Task;

/// Run `tasks` with at most `concurrency` in flight; results keep input order.
///
/// `concurrency` is validated before any task is called. Values below 1
/// fail with [`FlowError::InvalidConcurrency`], converted into `E`.
///
/// ```rust,ignore
/// let results = pool(
///     vec![
///         boxed(|| async {
///             tokio::time::sleep(Duration::from_millis(100)).await;
///             Ok("hello")
///         }),
///         boxed(|| async { Ok("hi") }),
///     ],
///     2,
/// )
/// .await?;
/// assert_eq!(results, vec!["hello", "hi"]);
/// ```
pub async fn pool<I, C, T, E>(tasks: I, concurrency: C) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    I::Item: Task<T, E>,
    C: TryInto<Concurrency>,
    C::Error: Into<FlowError>,
    E: From<FlowError> + Display,
{
    run_pool(tasks, concurrency, Recorder::new(None)).await
}

/// Same contract as [`pool`], with each task spawned on the tokio runtime.
///
/// Tasks are called on the runtime's workers, so synchronous task bodies
/// run in parallel on a multi-threaded runtime. Must be called from within
/// a tokio runtime. A task that panics, whether while being called or while
/// being polled, fails the run with [`FlowError::TaskPanicked`].
pub async fn pool_spawned<I, C, T, E>(tasks: I, concurrency: C) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    I::Item: Task<T, E> + Send + 'static,
    <I::Item as Task<T, E>>::Future: Send + 'static,
    C: TryInto<Concurrency>,
    C::Error: Into<FlowError>,
    T: Send + 'static,
    E: From<FlowError> + Display + Send + 'static,
{
    run_pool_spawned(tasks, concurrency, Recorder::new(None)).await
}

/// Scheduling state owned by a single pool run
struct PoolRun<'a, T, E> {
    /// One slot per input task, filled in completion order
    slots: Vec<Option<T>>,
    /// First failure and the task that caused it (None for a lost task)
    failure: Option<(Option<usize>, E)>,
    /// Outcomes dropped because the run had already failed
    discarded: usize,
    recorder: Recorder<'a>,
    start: Instant,
}

impl<'a, T, E: Display> PoolRun<'a, T, E> {
    fn new(task_count: usize, recorder: Recorder<'a>) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(task_count).collect(),
            failure: None,
            discarded: 0,
            recorder,
            start: Instant::now(),
        }
    }

    /// Still scheduling new tasks (no failure observed yet)
    fn accepting(&self) -> bool {
        self.failure.is_none()
    }

    fn record(&mut self, index: usize, outcome: Result<T, E>) {
        if !self.accepting() {
            self.discard(index);
            return;
        }
        match outcome {
            Ok(value) => self.slots[index] = Some(value),
            Err(e) => self.fail(Some(index), e),
        }
    }

    fn fail(&mut self, index: Option<usize>, e: E) {
        if !self.accepting() {
            if let Some(index) = index {
                self.discard(index);
            }
            return;
        }
        warn!(index = ?index, error = %e, "Pool task failed, no new tasks will start");
        self.failure = Some((index, e));
    }

    fn discard(&mut self, index: usize) {
        debug!(index, "Discarding outcome of task settled after failure");
        self.discarded += 1;
        self.recorder.task_discarded(index);
    }

    fn finish(self) -> Result<Vec<T>, E> {
        if let Some((index, e)) = self.failure {
            if self.discarded > 0 {
                debug!(discarded = self.discarded, "Drained in-flight tasks");
            }
            self.recorder.run_failed(&e, index);
            return Err(e);
        }

        self.recorder.run_completed(self.start.elapsed());
        let results: Vec<T> = self.slots.into_iter().flatten().collect();
        Ok(results)
    }
}

/// Validate the limit before anything runs
fn validate<C, E>(concurrency: C, recorder: Recorder<'_>) -> Result<Concurrency, E>
where
    C: TryInto<Concurrency>,
    C::Error: Into<FlowError>,
    E: From<FlowError>,
{
    concurrency.try_into().map_err(|e| {
        let e: FlowError = e.into();
        warn!(error = %e, "Rejecting pool run");
        recorder.run_failed(&e, None);
        E::from(e)
    })
}

#[instrument(skip_all, fields(tasks = tracing::field::Empty, concurrency = tracing::field::Empty))]
pub(crate) async fn run_pool<I, C, T, E>(
    tasks: I,
    concurrency: C,
    recorder: Recorder<'_>,
) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    I::Item: Task<T, E>,
    C: TryInto<Concurrency>,
    C::Error: Into<FlowError>,
    E: From<FlowError> + Display,
{
    let limit = validate::<C, E>(concurrency, recorder)?.get();
    let tasks: Vec<I::Item> = tasks.into_iter().collect();
    let span = tracing::Span::current();
    span.record("tasks", tasks.len());
    span.record("concurrency", limit);
    recorder.run_started(Combinator::Pool, tasks.len());

    let mut run = PoolRun::new(tasks.len(), recorder);
    let mut pending = tasks.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();

    loop {
        if run.accepting() {
            while in_flight.len() < limit {
                let Some((index, task)) = pending.next() else {
                    break;
                };
                recorder.task_started(index);
                debug!(index, in_flight = in_flight.len() + 1, "Task started");
                let start = Instant::now();
                let fut = task.call();
                in_flight.push(async move { (index, recorder.settle(index, start, fut).await) });
            }
        }

        let Some((index, outcome)) = in_flight.next().await else {
            break;
        };
        run.record(index, outcome);
    }

    run.finish()
}

#[instrument(skip_all, fields(tasks = tracing::field::Empty, concurrency = tracing::field::Empty))]
pub(crate) async fn run_pool_spawned<I, C, T, E>(
    tasks: I,
    concurrency: C,
    recorder: Recorder<'_>,
) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    I::Item: Task<T, E> + Send + 'static,
    <I::Item as Task<T, E>>::Future: Send + 'static,
    C: TryInto<Concurrency>,
    C::Error: Into<FlowError>,
    T: Send + 'static,
    E: From<FlowError> + Display + Send + 'static,
{
    let limit = validate::<C, E>(concurrency, recorder)?.get();
    let tasks: Vec<I::Item> = tasks.into_iter().collect();
    let span = tracing::Span::current();
    span.record("tasks", tasks.len());
    span.record("concurrency", limit);
    recorder.run_started(Combinator::SpawnedPool, tasks.len());

    let mut run = PoolRun::new(tasks.len(), recorder);
    let mut pending = tasks.into_iter().enumerate();
    let mut join_set = JoinSet::new();

    loop {
        if run.accepting() {
            while join_set.len() < limit {
                let Some((index, task)) = pending.next() else {
                    break;
                };
                recorder.task_started(index);
                debug!(index, in_flight = join_set.len() + 1, "Task spawned");
                // Called on the worker so synchronous bodies and their panics stay off the caller
                join_set.spawn(async move {
                    let start = Instant::now();
                    let outcome = AssertUnwindSafe(async move { task.call().await })
                        .catch_unwind()
                        .await;
                    (index, start, outcome)
                });
            }
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };

        match joined {
            Ok((index, start, Ok(outcome))) => {
                recorder.outcome(index, start.elapsed(), &outcome);
                run.record(index, outcome);
            }
            Ok((index, start, Err(payload))) => {
                let reason = panic_reason(payload.as_ref());
                error!(index, reason = %reason, "Task panicked");
                let err = FlowError::TaskPanicked { index, reason };
                recorder.task_failed(index, &err, start.elapsed());
                run.record(index, Err(E::from(err)));
            }
            Err(join_error) => {
                error!(error = %join_error, "Spawned task was lost");
                let err = FlowError::TaskCancelled {
                    reason: join_error.to_string(),
                };
                run.fail(None, E::from(err));
            }
        }
    }

    run.finish()
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
