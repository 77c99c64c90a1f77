//! Sequence runner
//!
//! One task at a time, left to right. Task `i + 1` is only called after
//! task `i` has settled.

use std::fmt::Display;
use std::time::Instant;

use tracing::{instrument, warn};

use crate::event_log::{Combinator, Recorder};
use crate::task::Task;

/// Run `tasks` strictly one after another and collect their results.
///
/// Stops at the first failure: later tasks are never called and the error
/// is returned as-is.
pub async fn sequence<I, T, E>(tasks: I) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    I::Item: Task<T, E>,
    E: Display,
{
    run_sequence(tasks, Recorder::new(None)).await
}

#[instrument(skip_all, fields(tasks = tracing::field::Empty))]
pub(crate) async fn run_sequence<I, T, E>(tasks: I, recorder: Recorder<'_>) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    I::Item: Task<T, E>,
    E: Display,
{
    let tasks: Vec<I::Item> = tasks.into_iter().collect();
    tracing::Span::current().record("tasks", tasks.len());
    recorder.run_started(Combinator::Sequence, tasks.len());
    let run_start = Instant::now();

    let mut results = Vec::with_capacity(tasks.len());
    for (index, task) in tasks.into_iter().enumerate() {
        match recorder.track(index, task.call()).await {
            Ok(value) => results.push(value),
            Err(e) => {
                warn!(index, error = %e, "Task failed, skipping remaining tasks");
                recorder.run_failed(&e, Some(index));
                return Err(e);
            }
        }
    }

    recorder.run_completed(run_start.elapsed());
    Ok(results)
}
