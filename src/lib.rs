//! Taskline - async task combinators
//!
//! Three ways to run a list of async tasks:
//!
//! | Combinator | Runs | Returns |
//! |------------|------|---------|
//! | [`sequence()`] | one at a time, left to right | every result, in order |
//! | [`pipeline()`] | one at a time, each fed the previous result | the last result |
//! | [`pool()`] | up to `concurrency` at once | every result, in input order |
//!
//! All three fail fast: the first task error is returned unchanged and no
//! further tasks are started. A pool waits for tasks already in flight and
//! drops their outcomes.
//!
//! ```rust,ignore
//! use taskline::{pool, task::boxed};
//!
//! let pages = pool(urls.into_iter().map(|url| boxed(move || fetch(url))), 4).await?;
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`task`] | `Task` / `Stage` traits, boxing helpers |
//! | [`sequence`](mod@sequence) | Sequential runner |
//! | [`pipeline`](mod@pipeline) | Data-flow chain, `Args`, `PipelineOutput` |
//! | [`pool`](mod@pool) | Bounded, order-preserving fan-out |
//! | [`runner`] | `Runner` facade with config + event log |
//! | [`event_log`] | Append-only run/task event log |
//! | [`config`] | `Concurrency`, `RunnerConfig` (TOML + env) |
//! | [`error`] | Error types with fix suggestions |

pub mod config;
pub mod error;
pub mod event_log;
pub mod pipeline;
pub mod pool;
pub mod runner;
pub mod sequence;
pub mod task;

pub use config::{Concurrency, RunnerConfig};
pub use error::{FixSuggestion, FlowError};
pub use event_log::{Combinator, Event, EventKind, EventLog};
pub use pipeline::{pipeline, Args, PipelineOutput};
pub use pool::{pool, pool_spawned};
pub use runner::Runner;
pub use sequence::sequence;
pub use task::{BoxStage, BoxTask, LocalBoxTask, Stage, Task};
