//! Event log for combinator runs
//!
//! Optional audit trail of what a run did and in which order.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: run-level and task-level variants
//! - EventLog: thread-safe, append-only log, cheap to clone

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Single event in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// Which combinator produced a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    Sequence,
    Pipeline,
    Pool,
    SpawnedPool,
}

impl std::fmt::Display for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Combinator::Sequence => write!(f, "sequence"),
            Combinator::Pipeline => write!(f, "pipeline"),
            Combinator::Pool => write!(f, "pool"),
            Combinator::SpawnedPool => write!(f, "spawned_pool"),
        }
    }
}

/// All possible event types (2 levels)
///
/// Task events are keyed by the task's position in the input list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        combinator: Combinator,
        task_count: usize,
    },
    RunCompleted {
        duration_ms: u64,
    },
    RunFailed {
        error: String,
        /// None when the run failed before any task started
        failed_task: Option<usize>,
    },

    // ═══════════════════════════════════════════
    // TASK LEVEL
    // ═══════════════════════════════════════════
    TaskStarted {
        index: usize,
    },
    TaskCompleted {
        index: usize,
        duration_ms: u64,
    },
    TaskFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },
    /// Task settled after the run had already failed; outcome dropped
    TaskDiscarded {
        index: usize,
    },
}

impl EventKind {
    /// Extract the task index if event is task-related
    pub fn task_index(&self) -> Option<usize> {
        match self {
            Self::TaskStarted { index }
            | Self::TaskCompleted { index, .. }
            | Self::TaskFailed { index, .. }
            | Self::TaskDiscarded { index } => Some(*index),
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunFailed { .. } => None,
        }
    }

    /// Check if this is a run-level event
    pub fn is_run_event(&self) -> bool {
        matches!(
            self,
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunFailed { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        // Id and push under one lock so ids stay in vector order
        let mut events = self.events.write();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        events.push(Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        });
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Filter events by task index
    pub fn filter_task(&self, index: usize) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.task_index() == Some(index))
            .collect()
    }

    /// Filter run-level events only
    pub fn run_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_run_event())
            .collect()
    }

    /// Indexes of tasks in the order they were started
    pub fn start_order(&self) -> Vec<usize> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::TaskStarted { index } => Some(index),
                _ => None,
            })
            .collect()
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}

/// Per-run recorder; a no-op when no log is attached
#[derive(Debug, Clone, Copy)]
pub(crate) struct Recorder<'a> {
    log: Option<&'a EventLog>,
}

impl<'a> Recorder<'a> {
    pub(crate) fn new(log: Option<&'a EventLog>) -> Self {
        Self { log }
    }

    pub(crate) fn emit(&self, kind: EventKind) {
        if let Some(log) = self.log {
            log.emit(kind);
        }
    }

    pub(crate) fn run_started(&self, combinator: Combinator, task_count: usize) {
        debug!(combinator = %combinator, task_count, "Run started");
        self.emit(EventKind::RunStarted {
            combinator,
            task_count,
        });
    }

    pub(crate) fn run_completed(&self, elapsed: Duration) {
        self.emit(EventKind::RunCompleted {
            duration_ms: elapsed.as_millis() as u64,
        });
    }

    pub(crate) fn run_failed(&self, error: &dyn std::fmt::Display, failed_task: Option<usize>) {
        if self.log.is_some() {
            self.emit(EventKind::RunFailed {
                error: error.to_string(),
                failed_task,
            });
        }
    }

    pub(crate) fn task_started(&self, index: usize) {
        self.emit(EventKind::TaskStarted { index });
    }

    pub(crate) fn task_completed(&self, index: usize, elapsed: Duration) {
        self.emit(EventKind::TaskCompleted {
            index,
            duration_ms: elapsed.as_millis() as u64,
        });
    }

    pub(crate) fn task_failed(&self, index: usize, error: &dyn std::fmt::Display, elapsed: Duration) {
        if self.log.is_some() {
            self.emit(EventKind::TaskFailed {
                index,
                error: error.to_string(),
                duration_ms: elapsed.as_millis() as u64,
            });
        }
    }

    pub(crate) fn task_discarded(&self, index: usize) {
        self.emit(EventKind::TaskDiscarded { index });
    }

    /// Await one task's future, recording its start and outcome
    pub(crate) async fn track<Fut, T, E>(&self, index: usize, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.task_started(index);
        debug!(index, "Task started");
        self.settle(index, Instant::now(), fut).await
    }

    /// Await a task that was already recorded as started
    pub(crate) async fn settle<Fut, T, E>(&self, index: usize, start: Instant, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let outcome = fut.await;
        self.outcome(index, start.elapsed(), &outcome);
        outcome
    }

    /// Record how a task settled
    pub(crate) fn outcome<T, E>(&self, index: usize, elapsed: Duration, outcome: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match outcome {
            Ok(_) => {
                debug!(index, elapsed_ms = elapsed.as_millis() as u64, "Task completed");
                self.task_completed(index, elapsed);
            }
            Err(e) => {
                debug!(index, error = %e, "Task failed");
                self.task_failed(index, e, elapsed);
            }
        }
    }
}
