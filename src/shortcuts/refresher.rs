//! Asynchronous re-validation of stored shortcuts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::corpus::Corpora;
use crate::cursor::ListSuggestionCursor;
use crate::executor::{NamedTask, SourceTaskExecutor};
use crate::models::Suggestion;

/// Receives the outcome of one shortcut refresh.
///
/// `refreshed` is `None` when the shortcut is no longer valid. The
/// receiver owns the cursor and must close it.
pub trait ShortcutRefreshListener: Send + Sync {
    fn on_shortcut_refreshed(
        &self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<ListSuggestionCursor>,
    );
}

fn memo_key(source: &str, shortcut_id: &str) -> String {
    format!("{}#{}", source, shortcut_id)
}

/// Dispatches shortcut validation tasks to sources.
///
/// Each `(source, shortcut id)` is refreshed at most once until
/// [`reset`](ShortcutRefresher::reset).
pub struct ShortcutRefresher {
    executor: Arc<dyn SourceTaskExecutor>,
    corpora: Arc<Corpora>,
    /// Memo key → whether the refresh finished.
    refreshed: Arc<Mutex<HashMap<String, bool>>>,
}

impl ShortcutRefresher {
    pub fn new(executor: Arc<dyn SourceTaskExecutor>, corpora: Arc<Corpora>) -> Self {
        Self {
            executor,
            corpora,
            refreshed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn should_refresh(&self, shortcut: &Suggestion) -> bool {
        match &shortcut.shortcut_id {
            Some(id) => !self
                .refreshed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains_key(&memo_key(&shortcut.source, id)),
            None => false,
        }
    }

    /// Start refreshing `shortcut` unless it was already refreshed.
    ///
    /// An unresolvable source is reported as invalid immediately, on the
    /// calling task.
    pub fn refresh(&self, shortcut: &Suggestion, listener: Arc<dyn ShortcutRefreshListener>) {
        let Some(shortcut_id) = shortcut.shortcut_id.clone() else {
            return;
        };
        let key = memo_key(&shortcut.source, &shortcut_id);
        {
            let mut memo = self.refreshed.lock().unwrap_or_else(|e| e.into_inner());
            if memo.contains_key(&key) {
                return;
            }
            memo.insert(key.clone(), false);
        }

        let Some(source) = self.corpora.source(&shortcut.source) else {
            debug!(source = %shortcut.source, shortcut_id = %shortcut_id, "source gone, shortcut invalid");
            self.finish(&key);
            listener.on_shortcut_refreshed(&shortcut.source, &shortcut_id, None);
            return;
        };

        let original = shortcut.clone();
        let memo = self.refreshed.clone();
        let task_name = format!("refresh {}", key);
        self.executor.execute(NamedTask::boxed(task_name, async move {
            let extra = original.intent.extra_data.as_deref();
            let outcome = source.refresh_shortcut(&shortcut_id, extra).await;
            let refreshed = match outcome {
                Ok(Some(row)) => Some(ListSuggestionCursor::from_rows("", vec![row])),
                Ok(None) => None,
                Err(e) => {
                    // A failed refresh leaves the shortcut unchanged.
                    warn!(source = %original.source, shortcut_id = %shortcut_id, error = %e, "shortcut refresh failed");
                    Some(ListSuggestionCursor::from_rows("", vec![original.clone()]))
                }
            };
            memo.lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, true);
            listener.on_shortcut_refreshed(&original.source, &shortcut_id, refreshed);
        }));
    }

    /// Record that a shortcut needs no refresh, e.g. because it was just clicked.
    pub fn mark_shortcut_refreshed(&self, source: &str, shortcut_id: &str) {
        self.finish(&memo_key(source, shortcut_id));
    }

    /// Forget every refresh, forcing re-validation.
    pub fn reset(&self) {
        self.refreshed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Drop refresh tasks that have not started. Their shortcuts become
    /// eligible for refresh again.
    pub fn cancel_pending_tasks(&self) {
        self.executor.cancel_pending_tasks();
        self.refreshed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, done| *done);
    }

    fn finish(&self, key: &str) {
        self.refreshed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), true);
    }
}
