use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::debug;

use super::{SourceTask, SourceTaskExecutor, TaskFuture};

#[derive(Default)]
struct Tracker {
    running: AtomicUsize,
    idle: Notify,
}

struct RunningGuard(Arc<Tracker>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if self.0.running.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Wraps a task so the dispatcher learns when it starts and finishes.
struct TrackedTask {
    task: Box<dyn SourceTask>,
    started: oneshot::Sender<()>,
    tracker: Arc<Tracker>,
}

impl SourceTask for TrackedTask {
    fn name(&self) -> &str {
        self.task.name()
    }

    fn run(self: Box<Self>) -> TaskFuture {
        let TrackedTask {
            task,
            started,
            tracker,
        } = *self;
        Box::pin(async move {
            tracker.running.fetch_add(1, Ordering::AcqRel);
            let _guard = RunningGuard(tracker);
            let _ = started.send(());
            task.run().await;
        })
    }
}

struct Shared {
    queue: Mutex<VecDeque<Box<dyn SourceTask>>>,
    notify: Notify,
    closed: AtomicBool,
    /// Bumped on every cancel so the dispatcher drops a task it holds.
    epoch: AtomicU64,
    tracker: Arc<Tracker>,
}

/// Admits tasks to an inner executor one at a time.
///
/// A single dispatcher task waits until nothing is running or `delay`
/// has elapsed, hands exactly one task to the inner executor, and then
/// waits for that task to start before admitting the next.
pub struct DelayingTaskExecutor {
    inner: Arc<dyn SourceTaskExecutor>,
    shared: Arc<Shared>,
}

impl DelayingTaskExecutor {
    /// Must be created inside a tokio runtime.
    pub fn new(inner: Arc<dyn SourceTaskExecutor>, delay: Duration) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            tracker: Arc::new(Tracker::default()),
        });
        tokio::spawn(dispatch(shared.clone(), inner.clone(), delay));
        Self { inner, shared }
    }

    /// Number of tasks not yet admitted to the inner executor.
    pub fn pending(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Number of admitted tasks currently running.
    pub fn running(&self) -> usize {
        self.shared.tracker.running.load(Ordering::Acquire)
    }
}

async fn next_task(shared: &Shared) -> Option<(u64, Box<dyn SourceTask>)> {
    loop {
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if shared.closed.load(Ordering::Acquire) {
            return None;
        }
        let popped = {
            let mut queue = shared.queue.lock().unwrap_or_else(|e| e.into_inner());
            queue
                .pop_front()
                .map(|task| (shared.epoch.load(Ordering::Acquire), task))
        };
        if popped.is_some() {
            return popped;
        }
        notified.await;
    }
}

async fn wait_idle(tracker: &Tracker, delay: Duration) {
    let deadline = Instant::now() + delay;
    loop {
        let idle = tracker.idle.notified();
        tokio::pin!(idle);
        idle.as_mut().enable();

        if tracker.running.load(Ordering::Acquire) == 0 {
            return;
        }
        if tokio::time::timeout_at(deadline, idle).await.is_err() {
            return;
        }
    }
}

async fn dispatch(shared: Arc<Shared>, inner: Arc<dyn SourceTaskExecutor>, delay: Duration) {
    while let Some((epoch, task)) = next_task(&shared).await {
        wait_idle(&shared.tracker, delay).await;
        if shared.epoch.load(Ordering::Acquire) != epoch {
            debug!(task = task.name(), "cancelled while waiting for admission");
            continue;
        }

        let (started_tx, started_rx) = oneshot::channel();
        inner.execute(Box::new(TrackedTask {
            task,
            started: started_tx,
            tracker: shared.tracker.clone(),
        }));

        // Err means the inner executor dropped the task before it ran.
        if started_rx.await.is_err() {
            debug!("admitted task was cancelled before starting");
        }
    }
    debug!("delaying dispatcher stopped");
}

impl SourceTaskExecutor for DelayingTaskExecutor {
    fn execute(&self, task: Box<dyn SourceTask>) {
        if self.shared.closed.load(Ordering::Acquire) {
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
        let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.clear();
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        drop(queue);
        self.inner.cancel_pending_tasks();
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.shared.notify.notify_waiters();
        self.inner.close();
    }
}

impl Drop for DelayingTaskExecutor {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{NamedTask, PooledTaskExecutor};

    #[tokio::test]
    async fn test_runs_every_task() {
        let pool: Arc<dyn SourceTaskExecutor> = Arc::new(PooledTaskExecutor::new("pool", 4));
        let executor = DelayingTaskExecutor::new(pool, Duration::from_millis(20));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for i in 0..5 {
            let tx = tx.clone();
            executor.execute(NamedTask::boxed(format!("t{}", i), async move {
                let _ = tx.send(i);
            }));
        }
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(rx.recv().await.unwrap());
        }
        assert_eq!(seen.len(), 5);
        executor.close();
    }

    #[tokio::test]
    async fn test_staggers_starts_while_busy() {
        let pool: Arc<dyn SourceTaskExecutor> = Arc::new(PooledTaskExecutor::new("pool", 4));
        let delay = Duration::from_millis(50);
        let executor = DelayingTaskExecutor::new(pool, delay);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for _ in 0..3 {
            let tx = tx.clone();
            executor.execute(NamedTask::boxed("slow", async move {
                let _ = tx.send(Instant::now());
                tokio::time::sleep(Duration::from_millis(500)).await;
            }));
        }
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert!(second - first >= Duration::from_millis(40));
        assert!(third - second >= Duration::from_millis(40));
        executor.close();
    }

    #[tokio::test]
    async fn test_cancel_drops_queued_tasks() {
        let pool: Arc<dyn SourceTaskExecutor> = Arc::new(PooledTaskExecutor::new("pool", 1));
        let executor = DelayingTaskExecutor::new(pool, Duration::from_secs(5));
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        executor.execute(NamedTask::boxed("blocker", async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
        }));
        started_rx.await.unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let ran = ran.clone();
            executor.execute(NamedTask::boxed("queued", async move {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        executor.cancel_pending_tasks();
        let _ = release_tx.send(());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(executor.running(), 0);
        executor.close();
    }
}
