//! Task abstraction
//!
//! A task is anything that, when called, yields a future resolving to
//! `Result<T, E>`. Closures returning `async` blocks qualify through a
//! blanket impl; synchronous work is lifted with [`from_fn`] into an
//! already-resolved future.
//!
//! Lists of distinct closures need a common type, so [`boxed`] and
//! [`boxed_stage`] erase them into [`BoxTask`] / [`BoxStage`].

use std::future::Future;

use futures::future::{self, BoxFuture, LocalBoxFuture, Ready};
use futures::FutureExt;

use crate::pipeline::Args;

/// Zero-argument unit of work, used by `sequence` and `pool`
pub trait Task<T, E> {
    type Future: Future<Output = Result<T, E>>;

    /// Start the work. Nothing runs before this is called.
    fn call(self) -> Self::Future;
}

impl<F, Fut, T, E> Task<T, E> for F
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    type Future = Fut;

    fn call(self) -> Fut {
        self()
    }
}

/// Pipeline stage: receives the previous stage's output as its arguments
pub trait Stage<T, E> {
    type Future: Future<Output = Result<T, E>>;

    fn call(self, args: Args<T>) -> Self::Future;
}

impl<F, Fut, T, E> Stage<T, E> for F
where
    F: FnOnce(Args<T>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    type Future = Fut;

    fn call(self, args: Args<T>) -> Fut {
        self(args)
    }
}

/// Type-erased, `Send` task
pub type BoxTask<'a, T, E> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a>;

/// Type-erased task for `!Send` futures
pub type LocalBoxTask<'a, T, E> = Box<dyn FnOnce() -> LocalBoxFuture<'a, Result<T, E>> + 'a>;

/// Type-erased, `Send` pipeline stage
pub type BoxStage<'a, T, E> =
    Box<dyn FnOnce(Args<T>) -> BoxFuture<'a, Result<T, E>> + Send + 'a>;

/// Erase a task closure so it can share a `Vec` with other tasks
pub fn boxed<'a, F, Fut, T, E>(f: F) -> BoxTask<'a, T, E>
where
    F: FnOnce() -> Fut + Send + 'a,
    Fut: Future<Output = Result<T, E>> + Send + 'a,
{
    Box::new(move || f().boxed())
}

/// Same as [`boxed`] for tasks whose futures are not `Send`
pub fn local_boxed<'a, F, Fut, T, E>(f: F) -> LocalBoxTask<'a, T, E>
where
    F: FnOnce() -> Fut + 'a,
    Fut: Future<Output = Result<T, E>> + 'a,
{
    Box::new(move || f().boxed_local())
}

/// Erase a stage closure so it can share a `Vec` with other stages
pub fn boxed_stage<'a, F, Fut, T, E>(f: F) -> BoxStage<'a, T, E>
where
    F: FnOnce(Args<T>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<T, E>> + Send + 'a,
{
    Box::new(move |args| f(args).boxed())
}

/// Lift synchronous work into a task.
///
/// `f` runs when the task is called, not when it is built.
pub fn from_fn<F, T, E>(f: F) -> impl FnOnce() -> Ready<Result<T, E>>
where
    F: FnOnce() -> Result<T, E>,
{
    move || future::ready(f())
}

/// An already-resolved value, e.g. for pipeline initial arguments
pub fn resolved<T, E>(value: T) -> Ready<Result<T, E>> {
    future::ready(Ok(value))
}
