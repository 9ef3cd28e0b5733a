//! Task executors for source queries and shortcut refreshes.
//!
//! Three layers compose into the query engine's scheduler:
//!
//! ```text
//!   BatchingTaskExecutor      (per query: releases tasks in slices)
//!          │
//!          ▼
//!   DelayingTaskExecutor      (shared: staggers task starts)
//!          │
//!          ▼
//!   PooledTaskExecutor        (shared: N worker tasks, unbounded queue)
//! ```
//!
//! Cancellation only ever drops work that has not started. Running
//! tasks are never interrupted.

mod batching;
mod delaying;
mod pool;

use std::future::Future;
use std::pin::Pin;

pub use batching::BatchingTaskExecutor;
pub use delaying::DelayingTaskExecutor;
pub use pool::PooledTaskExecutor;

pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A unit of work submitted to an executor.
pub trait SourceTask: Send + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn run(self: Box<Self>) -> TaskFuture;
}

pub trait SourceTaskExecutor: Send + Sync {
    /// Submit a task. Tasks start in submission order.
    fn execute(&self, task: Box<dyn SourceTask>);

    /// Drop every task that has been submitted but not started.
    fn cancel_pending_tasks(&self);

    /// Cancel pending work and stop accepting tasks.
    fn close(&self);
}

/// A [`SourceTask`] built from a name and a future.
pub struct NamedTask {
    name: String,
    future: TaskFuture,
}

impl NamedTask {
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: Box::pin(future),
        }
    }

    pub fn boxed<F>(name: impl Into<String>, future: F) -> Box<dyn SourceTask>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Box::new(Self::new(name, future))
    }
}

impl SourceTask for NamedTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>) -> TaskFuture {
        self.future
    }
}
