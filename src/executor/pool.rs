use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::Notify;
use tracing::{debug, error};

use super::{SourceTask, SourceTaskExecutor};

struct Shared {
    name: String,
    queue: Mutex<VecDeque<Box<dyn SourceTask>>>,
    notify: Notify,
    closed: AtomicBool,
}

impl Shared {
    fn pop(&self) -> Option<Box<dyn SourceTask>> {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

/// Fixed number of worker tasks draining an unbounded FIFO queue.
///
/// Must be created inside a tokio runtime.
pub struct PooledTaskExecutor {
    shared: Arc<Shared>,
}

impl PooledTaskExecutor {
    pub fn new(name: impl Into<String>, workers: usize) -> Self {
        let shared = Arc::new(Shared {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });

        for id in 0..workers.max(1) {
            tokio::spawn(worker(shared.clone(), id));
        }

        Self { shared }
    }

    /// Number of tasks waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

async fn worker(shared: Arc<Shared>, id: usize) {
    loop {
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if shared.closed.load(Ordering::Acquire) {
            break;
        }

        let Some(task) = shared.pop() else {
            notified.await;
            continue;
        };

        let task_name = task.name().to_string();
        if AssertUnwindSafe(task.run()).catch_unwind().await.is_err() {
            error!(pool = %shared.name, worker = id, task = %task_name, "task panicked");
        }
    }
    debug!(pool = %shared.name, worker = id, "worker stopped");
}

impl SourceTaskExecutor for PooledTaskExecutor {
    fn execute(&self, task: Box<dyn SourceTask>) {
        if self.shared.closed.load(Ordering::Acquire) {
            debug!(pool = %self.shared.name, task = task.name(), "executor closed, task dropped");
            return;
        }
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(task);
        self.shared.notify.notify_one();
    }

    fn cancel_pending_tasks(&self) {
        let dropped: Vec<_> = self
            .shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        if !dropped.is_empty() {
            debug!(pool = %self.shared.name, count = dropped.len(), "cancelled pending tasks");
        }
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.cancel_pending_tasks();
        self.shared.notify.notify_waiters();
    }
}

impl Drop for PooledTaskExecutor {
    fn drop(&mut self) {
        self.close();
    }
}
