use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{SourceTask, SourceTaskExecutor};

struct BatchState {
    queued: VecDeque<Box<dyn SourceTask>>,
    /// Tasks still allowed through immediately.
    first_batch_left: usize,
    cancelled: bool,
}

/// Releases tasks to an inner executor in slices of `batch_size`.
///
/// The first `batch_size` tasks are dispatched as soon as they are
/// submitted; later ones wait for [`execute_next_batch`]. One instance
/// serves one query and must not be reused after
/// [`cancel_pending_tasks`](SourceTaskExecutor::cancel_pending_tasks).
///
/// [`execute_next_batch`]: BatchingTaskExecutor::execute_next_batch
pub struct BatchingTaskExecutor {
    inner: Arc<dyn SourceTaskExecutor>,
    batch_size: usize,
    state: Mutex<BatchState>,
}

impl BatchingTaskExecutor {
    pub fn new(inner: Arc<dyn SourceTaskExecutor>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            inner,
            batch_size,
            state: Mutex::new(BatchState {
                queued: VecDeque::new(),
                first_batch_left: batch_size,
                cancelled: false,
            }),
        }
    }

    /// Dispatch up to `batch_size` queued tasks. Returns how many went out.
    pub fn execute_next_batch(&self) -> usize {
        let batch: Vec<_> = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.cancelled {
                return 0;
            }
            let n = state.queued.len().min(self.batch_size);
            state.queued.drain(..n).collect()
        };

        let released = batch.len();
        if released > 0 {
            debug!(released, "releasing next batch");
        }
        for task in batch {
            self.inner.execute(task);
        }
        released
    }

    /// Number of tasks waiting for a later batch.
    pub fn queued(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queued
            .len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl SourceTaskExecutor for BatchingTaskExecutor {
    fn execute(&self, task: Box<dyn SourceTask>) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            assert!(
                !state.cancelled,
                "batching executor used after cancel_pending_tasks()"
            );
            if state.first_batch_left == 0 {
                state.queued.push_back(task);
                return;
            }
            state.first_batch_left -= 1;
        }
        self.inner.execute(task);
    }

    fn cancel_pending_tasks(&self) {
        let dropped = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.cancelled = true;
            std::mem::take(&mut state.queued)
        };
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "dropped unreleased tasks");
        }
        self.inner.cancel_pending_tasks();
    }

    fn close(&self) {
        self.cancel_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NamedTask;

    /// Inner executor that records submissions without running them.
    #[derive(Default)]
    struct Recording {
        names: Mutex<Vec<String>>,
        cancels: Mutex<usize>,
    }

    impl SourceTaskExecutor for Recording {
        fn execute(&self, task: Box<dyn SourceTask>) {
            self.names.lock().unwrap().push(task.name().to_string());
        }

        fn cancel_pending_tasks(&self) {
            *self.cancels.lock().unwrap() += 1;
        }

        fn close(&self) {}
    }

    fn submit(executor: &BatchingTaskExecutor, names: &[&str]) {
        for name in names {
            executor.execute(NamedTask::boxed(*name, async {}));
        }
    }

    #[test]
    fn test_first_batch_goes_out_immediately() {
        let inner = Arc::new(Recording::default());
        let executor = BatchingTaskExecutor::new(inner.clone(), 2);
        submit(&executor, &["a", "b", "c", "d", "e"]);
        assert_eq!(*inner.names.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(executor.queued(), 3);
    }

    #[test]
    fn test_next_batch_releases_at_most_batch_size() {
        let inner = Arc::new(Recording::default());
        let executor = BatchingTaskExecutor::new(inner.clone(), 2);
        submit(&executor, &["a", "b", "c", "d", "e"]);
        assert_eq!(executor.execute_next_batch(), 2);
        assert_eq!(executor.execute_next_batch(), 1);
        assert_eq!(executor.execute_next_batch(), 0);
        assert_eq!(
            *inner.names.lock().unwrap(),
            vec!["a", "b", "c", "d", "e"]
        );
    }

    #[test]
    fn test_cancel_drops_queue_and_forwards() {
        let inner = Arc::new(Recording::default());
        let executor = BatchingTaskExecutor::new(inner.clone(), 1);
        submit(&executor, &["a", "b", "c"]);
        executor.cancel_pending_tasks();
        assert_eq!(executor.queued(), 0);
        assert_eq!(executor.execute_next_batch(), 0);
        assert_eq!(*inner.cancels.lock().unwrap(), 1);
        assert_eq!(*inner.names.lock().unwrap(), vec!["a"]);
    }

    #[test]
    #[should_panic(expected = "used after cancel")]
    fn test_execute_after_cancel_panics() {
        let inner = Arc::new(Recording::default());
        let executor = BatchingTaskExecutor::new(inner, 1);
        executor.cancel_pending_tasks();
        submit(&executor, &["late"]);
    }
}
