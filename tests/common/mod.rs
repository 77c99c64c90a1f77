//! Test fixtures and helpers

#![allow(dead_code)] // Each test binary uses a different subset

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use taskline::task::{boxed, BoxTask};
use taskline::FlowError;
use thiserror::Error;

/// Install a tracing subscriber once per test binary (RUST_LOG controls output)
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Typed task error, convertible from pool configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    #[error("task {0} failed")]
    Task(usize),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Start or end of an instrumented task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Start(usize),
    End(usize),
}

#[derive(Debug, Default)]
struct ProbeState {
    marks: Vec<Mark>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Shared recorder for instrumented tasks
#[derive(Debug, Clone, Default)]
pub struct Probe {
    state: Arc<Mutex<ProbeState>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&self, index: usize) {
        let mut state = self.state.lock().unwrap();
        state.marks.push(Mark::Start(index));
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
    }

    fn end(&self, index: usize) {
        let mut state = self.state.lock().unwrap();
        state.marks.push(Mark::End(index));
        state.in_flight -= 1;
    }

    /// Task that marks its start, sleeps, marks its end, then yields `outcome`
    pub fn task<T>(
        &self,
        index: usize,
        delay_ms: u64,
        outcome: Result<T, TestError>,
    ) -> BoxTask<'static, T, TestError>
    where
        T: Send + 'static,
    {
        let probe = self.clone();
        boxed(move || async move {
            probe.start(index);
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            } else {
                tokio::task::yield_now().await;
            }
            probe.end(index);
            outcome
        })
    }

    /// Successful task returning its own index
    pub fn ok(&self, index: usize, delay_ms: u64) -> BoxTask<'static, usize, TestError> {
        self.task(index, delay_ms, Ok(index))
    }

    /// Failing task
    pub fn failing(&self, index: usize, delay_ms: u64) -> BoxTask<'static, usize, TestError> {
        self.task(index, delay_ms, Err(TestError::Task(index)))
    }

    pub fn marks(&self) -> Vec<Mark> {
        self.state.lock().unwrap().marks.clone()
    }

    /// Indexes in the order tasks started
    pub fn started(&self) -> Vec<usize> {
        self.marks()
            .into_iter()
            .filter_map(|m| match m {
                Mark::Start(i) => Some(i),
                Mark::End(_) => None,
            })
            .collect()
    }

    /// Indexes in the order tasks finished
    pub fn finished(&self) -> Vec<usize> {
        self.marks()
            .into_iter()
            .filter_map(|m| match m {
                Mark::End(i) => Some(i),
                Mark::Start(_) => None,
            })
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }
}
