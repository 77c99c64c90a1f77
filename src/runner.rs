//! Runner facade
//!
//! Bundles a [`RunnerConfig`] and an optional [`EventLog`] so callers can
//! observe runs and use a configured default concurrency. The free
//! functions ([`sequence`](crate::sequence()), [`pipeline`](crate::pipeline()),
//! [`pool`](crate::pool())) are unobserved shortcuts for the same code paths.

use std::fmt::Display;
use std::future::Future;

use crate::config::{Concurrency, RunnerConfig};
use crate::error::FlowError;
use crate::event_log::{EventLog, Recorder};
use crate::pipeline::{run_pipeline, PipelineOutput};
use crate::pool::{run_pool, run_pool_spawned};
use crate::sequence::run_sequence;
use crate::task::{Stage, Task};

/// Combinator runner with optional event recording
#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: RunnerConfig,
    event_log: Option<EventLog>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner configured from the environment (`TASKLINE_CONCURRENCY`)
    pub fn from_env() -> Result<Self, FlowError> {
        Ok(Self::new().with_config(RunnerConfig::default().with_env()?))
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Record every run into `log`
    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.event_log = Some(log);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Attached event log, if any
    pub fn event_log(&self) -> Option<&EventLog> {
        self.event_log.as_ref()
    }

    fn recorder(&self) -> Recorder<'_> {
        Recorder::new(self.event_log.as_ref())
    }

    /// See [`sequence`](crate::sequence())
    pub async fn sequence<I, T, E>(&self, tasks: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Task<T, E>,
        E: Display,
    {
        run_sequence(tasks, self.recorder()).await
    }

    /// See [`pipeline`](crate::pipeline())
    pub async fn pipeline<S, A, T, E>(
        &self,
        stages: S,
        initial: impl IntoIterator<Item = A>,
    ) -> Result<PipelineOutput<T>, E>
    where
        S: IntoIterator,
        S::Item: Stage<T, E>,
        A: Future<Output = Result<T, E>>,
        E: Display,
    {
        run_pipeline(stages, initial, self.recorder()).await
    }

    /// See [`pool`](crate::pool())
    pub async fn pool<I, C, T, E>(&self, tasks: I, concurrency: C) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Task<T, E>,
        C: TryInto<Concurrency>,
        C::Error: Into<FlowError>,
        E: From<FlowError> + Display,
    {
        run_pool(tasks, concurrency, self.recorder()).await
    }

    /// [`Runner::pool`] with the configured concurrency
    pub async fn pool_default<I, T, E>(&self, tasks: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Task<T, E>,
        E: From<FlowError> + Display,
    {
        run_pool(tasks, self.config.concurrency, self.recorder()).await
    }

    /// See [`pool_spawned`](crate::pool_spawned())
    pub async fn pool_spawned<I, C, T, E>(&self, tasks: I, concurrency: C) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Task<T, E> + Send + 'static,
        <I::Item as Task<T, E>>::Future: Send + 'static,
        C: TryInto<Concurrency>,
        C::Error: Into<FlowError>,
        T: Send + 'static,
        E: From<FlowError> + Display + Send + 'static,
    {
        run_pool_spawned(tasks, concurrency, self.recorder()).await
    }
}
