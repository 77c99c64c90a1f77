//! Pipeline runner
//!
//! Runs stages one after another, feeding each stage the previous stage's
//! result. The first stage is fed the resolved initial arguments.

use std::fmt::Display;
use std::future::Future;
use std::ops::Deref;
use std::time::Instant;

use futures::future::try_join_all;
use smallvec::SmallVec;
use tracing::{instrument, warn};

use crate::event_log::{Combinator, Recorder};
use crate::task::Stage;

/// Ordered argument list handed to a pipeline stage.
///
/// The first stage gets every initial argument; later stages get exactly
/// one, the previous stage's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args<T>(SmallVec<[T; 4]>);

impl<T> Args<T> {
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Argument list holding a single value
    pub fn single(value: T) -> Self {
        let mut args = SmallVec::new();
        args.push(value);
        Self(args)
    }

    /// The only argument, or None if there are zero or several
    pub fn into_single(self) -> Option<T> {
        if self.0.len() != 1 {
            return None;
        }
        self.0.into_iter().next()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.0.into_vec()
    }
}

impl<T> Default for Args<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for Args<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> From<Vec<T>> for Args<T> {
    fn from(values: Vec<T>) -> Self {
        Self(SmallVec::from_vec(values))
    }
}

impl<T> FromIterator<T> for Args<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for Args<T> {
    type Item = T;
    type IntoIter = smallvec::IntoIter<[T; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutput<T> {
    /// Result of the last stage
    Value(T),
    /// No stages: the resolved initial arguments, in order
    Args(Vec<T>),
}

impl<T> PipelineOutput<T> {
    /// Last stage's value; None for a stage-less run
    pub fn into_value(self) -> Option<T> {
        match self {
            PipelineOutput::Value(value) => Some(value),
            PipelineOutput::Args(_) => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            PipelineOutput::Value(value) => Some(value),
            PipelineOutput::Args(_) => None,
        }
    }

    /// Flatten to a list (a stage value becomes a one-element list)
    pub fn into_vec(self) -> Vec<T> {
        match self {
            PipelineOutput::Value(value) => vec![value],
            PipelineOutput::Args(args) => args,
        }
    }
}

/// Run `stages` as a data-flow chain seeded with `initial`.
///
/// Initial arguments are resolved together, failing fast, before the first
/// stage runs. Any stage failure ends the chain with that error.
///
/// ```rust,ignore
/// let out = pipeline(
///     vec![
///         boxed_stage(|args: Args<String>| async move { Ok(format!("{}b", args[0])) }),
///         boxed_stage(|args: Args<String>| async move { Ok(format!("{}c", args[0])) }),
///     ],
///     vec![resolved("a".to_string())],
/// )
/// .await?;
/// assert_eq!(out.into_value().as_deref(), Some("abc"));
/// ```
pub async fn pipeline<S, I, A, T, E>(
    stages: S,
    initial: I,
) -> Result<PipelineOutput<T>, E>
where
    S: IntoIterator,
    S::Item: Stage<T, E>,
    I: IntoIterator<Item = A>,
    A: Future<Output = Result<T, E>>,
    E: Display,
{
    run_pipeline(stages, initial, Recorder::new(None)).await
}

#[instrument(skip_all, fields(stages = tracing::field::Empty))]
pub(crate) async fn run_pipeline<S, I, A, T, E>(
    stages: S,
    initial: I,
    recorder: Recorder<'_>,
) -> Result<PipelineOutput<T>, E>
where
    S: IntoIterator,
    S::Item: Stage<T, E>,
    I: IntoIterator<Item = A>,
    A: Future<Output = Result<T, E>>,
    E: Display,
{
    let stages: Vec<S::Item> = stages.into_iter().collect();
    tracing::Span::current().record("stages", stages.len());
    recorder.run_started(Combinator::Pipeline, stages.len());
    let run_start = Instant::now();

    let initial: Args<T> = match try_join_all(initial).await {
        Ok(values) => values.into(),
        Err(e) => {
            warn!(error = %e, "Initial argument failed");
            recorder.run_failed(&e, None);
            return Err(e);
        }
    };

    let mut pending_initial = Some(initial);
    let mut current: Option<T> = None;

    for (index, stage) in stages.into_iter().enumerate() {
        let input = match current.take() {
            Some(previous) => Args::single(previous),
            None => pending_initial.take().unwrap_or_default(),
        };

        match recorder.track(index, stage.call(input)).await {
            Ok(value) => current = Some(value),
            Err(e) => {
                warn!(index, error = %e, "Pipeline stage failed, aborting chain");
                recorder.run_failed(&e, Some(index));
                return Err(e);
            }
        }
    }

    recorder.run_completed(run_start.elapsed());
    Ok(match current {
        Some(value) => PipelineOutput::Value(value),
        None => PipelineOutput::Args(pending_initial.unwrap_or_default().into_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::{EventKind, EventLog};
    use crate::task::{boxed_stage, resolved, BoxStage};
    use futures::future::BoxFuture;
    use futures::FutureExt;

    type Stages = Vec<BoxStage<'static, String, String>>;

    fn append(suffix: &'static str) -> BoxStage<'static, String, String> {
        boxed_stage(move |args: Args<String>| async move {
            let prev = args.into_single().unwrap_or_default();
            Ok(format!("{prev}{suffix}"))
        })
    }

    #[test]
    fn args_single_and_into_single() {
        assert_eq!(Args::single(3).into_single(), Some(3));
        assert_eq!(Args::from(vec![1, 2]).into_single(), None);
        assert_eq!(Args::<u8>::new().into_single(), None);
    }

    #[test]
    fn args_derefs_to_slice() {
        let args: Args<u32> = (1..=3).collect();
        assert_eq!(args.len(), 3);
        assert_eq!(&args[..], &[1, 2, 3]);
        assert_eq!(args.into_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn output_accessors() {
        assert_eq!(PipelineOutput::Value(1).into_value(), Some(1));
        assert_eq!(PipelineOutput::Args(vec![1, 2]).into_value(), None);
        assert_eq!(PipelineOutput::Value(1).into_vec(), vec![1]);
        assert_eq!(PipelineOutput::<u8>::Args(vec![]).into_vec(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn threads_results_through_stages() {
        let stages: Stages = vec![append("b"), append("c")];
        let out = pipeline(stages, vec![resolved("a".to_string())])
            .await
            .unwrap();
        assert_eq!(out, PipelineOutput::Value("abc".to_string()));
    }

    #[tokio::test]
    async fn empty_stages_return_initial_args() {
        let stages: Stages = vec![];
        let initial: Vec<BoxFuture<'static, Result<String, String>>> = vec![
            resolved("a".to_string()).boxed(),
            async { Ok("b".to_string()) }.boxed(),
        ];
        let out = pipeline(stages, initial).await.unwrap();
        assert_eq!(
            out,
            PipelineOutput::Args(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[tokio::test]
    async fn failing_initial_arg_skips_stages() {
        let log = EventLog::new();
        let stages: Stages = vec![append("b")];
        let initial: Vec<BoxFuture<'static, Result<String, String>>> = vec![
            resolved("a".to_string()).boxed(),
            async { Err("no input".to_string()) }.boxed(),
        ];

        let err = run_pipeline(stages, initial, Recorder::new(Some(&log)))
            .await
            .unwrap_err();
        assert_eq!(err, "no input");
        assert!(log.start_order().is_empty());
        assert!(log.events().iter().any(|e| matches!(
            e.kind,
            EventKind::RunFailed {
                failed_task: None,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn first_stage_gets_all_initial_args() {
        let stages: Vec<BoxStage<'static, u32, String>> = vec![
            boxed_stage(|args: Args<u32>| async move { Ok(args.iter().sum()) }),
            boxed_stage(|args: Args<u32>| async move {
                assert_eq!(args.len(), 1);
                Ok(args[0] * 10)
            }),
        ];
        let out = pipeline(stages, vec![resolved(1), resolved(2), resolved(3)])
            .await
            .unwrap();
        assert_eq!(out.into_value(), Some(60));
    }
}
