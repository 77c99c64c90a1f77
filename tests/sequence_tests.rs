//! # Sequence Runner Tests
//!
//! - Empty input
//! - Strict left-to-right, non-overlapping execution
//! - Fail-fast on the first error
//! - Sync, async, and `!Send` tasks

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{init_tracing, Mark, Probe, TestError};
use pretty_assertions::assert_eq;
use taskline::task::{boxed, from_fn, local_boxed, BoxTask, LocalBoxTask};
use taskline::{sequence, EventKind, EventLog, Runner};

#[tokio::test]
async fn empty_sequence_resolves_to_empty_vec() {
    init_tracing();
    let tasks: Vec<BoxTask<'static, u8, TestError>> = Vec::new();
    assert_eq!(sequence(tasks).await, Ok(vec![]));
}

#[tokio::test(start_paused = true)]
async fn tasks_run_one_after_another() {
    init_tracing();
    let probe = Probe::new();
    // Slowest first: any overlap would show up in the marks
    let tasks = vec![probe.ok(0, 30), probe.ok(1, 20), probe.ok(2, 10)];

    let results = sequence(tasks).await.unwrap();

    assert_eq!(results, vec![0, 1, 2]);
    assert_eq!(
        probe.marks(),
        vec![
            Mark::Start(0),
            Mark::End(0),
            Mark::Start(1),
            Mark::End(1),
            Mark::Start(2),
            Mark::End(2),
        ]
    );
    assert_eq!(probe.max_in_flight(), 1);
}

#[tokio::test]
async fn failure_skips_remaining_tasks() {
    init_tracing();
    let probe = Probe::new();
    let tasks = vec![probe.ok(0, 0), probe.failing(1, 0), probe.ok(2, 0)];

    let err = sequence(tasks).await.unwrap_err();

    assert_eq!(err, TestError::Task(1));
    assert_eq!(probe.started(), vec![0, 1]);
}

#[tokio::test]
async fn mixes_sync_and_async_tasks() {
    init_tracing();
    let tasks: Vec<BoxTask<'static, String, TestError>> = vec![
        boxed(from_fn(|| Ok("sync".to_string()))),
        boxed(|| async {
            tokio::task::yield_now().await;
            Ok("async".to_string())
        }),
    ];

    assert_eq!(
        sequence(tasks).await.unwrap(),
        vec!["sync".to_string(), "async".to_string()]
    );
}

#[tokio::test]
async fn local_tasks_need_not_be_send() {
    init_tracing();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let tasks: Vec<LocalBoxTask<'_, usize, TestError>> = (0..3)
        .map(|i| {
            let seen = Rc::clone(&seen);
            local_boxed(move || async move {
                seen.borrow_mut().push(i);
                Ok(i * 2)
            })
        })
        .collect();

    assert_eq!(sequence(tasks).await, Ok(vec![0, 2, 4]));
    assert_eq!(*seen.borrow(), vec![0, 1, 2]);
}

#[tokio::test]
async fn borrowed_state_is_allowed() {
    let words = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
    let tasks = words
        .iter()
        .map(|w| boxed(move || async move { Ok::<_, TestError>(w.len()) }));

    assert_eq!(sequence(tasks).await, Ok(vec![1, 2, 3]));
}

#[tokio::test]
async fn repeated_runs_are_deterministic() {
    let make = || -> Vec<BoxTask<'static, u64, TestError>> {
        (1..=5u64)
            .map(|i| boxed(move || async move { Ok(i * i) }))
            .collect()
    };

    let first = sequence(make()).await.unwrap();
    for _ in 0..5 {
        assert_eq!(sequence(make()).await.unwrap(), first);
    }
}

#[tokio::test]
async fn runner_records_failure_index() {
    let log = EventLog::new();
    let runner = Runner::new().with_event_log(log.clone());
    let probe = Probe::new();

    let err = runner
        .sequence(vec![probe.ok(0, 0), probe.failing(1, 0), probe.ok(2, 0)])
        .await
        .unwrap_err();

    assert_eq!(err, TestError::Task(1));
    assert_eq!(log.start_order(), vec![0, 1]);
    let last = log.events().pop().unwrap();
    assert_eq!(
        last.kind,
        EventKind::RunFailed {
            error: "task 1 failed".to_string(),
            failed_task: Some(1),
        }
    );
}
