//! Click-log backed shortcuts.
//!
//! Every click on a suggestion is logged against the query it was made
//! for. Later queries that extend that query get the clicked suggestion
//! back as a *shortcut*, ranked by how often and how recently it was
//! clicked. The same log yields per-corpus click totals used to rank
//! corpora.
//!
//! # Architecture
//!
//! ```text
//!  report_click ─┐                       ┌─▶ ShortcutStore (SQLite | memory)
//!  refresh ──────┼─▶ WriteOp channel ─▶ writer task
//!  clear/remove ─┘
//!
//!  get_shortcuts_for_query ─▶ ShortcutStore ─▶ ShortcutCursor ─▶ ShortcutRefresher
//! ```
//!
//! All writes go through one writer task, in submission order, and never
//! report failure to the caller. Reads go straight to the store.

pub mod cursor;
pub mod refresher;
pub mod schema;
pub mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::corpus::{Corpora, Corpus};
use crate::cursor::{ListSuggestionCursor, SuggestionCursor};
use crate::models::Suggestion;

pub use cursor::ShortcutCursor;
pub use refresher::{ShortcutRefreshListener, ShortcutRefresher};
pub use store::{Click, ShortcutHit, ShortcutQuery, ShortcutStore};

/// The smallest string greater than every string starting with `s`.
///
/// Replaces the last code point of `s` with its successor, so that
/// `[s, next_string(s))` is exactly the set of strings with prefix `s`.
/// Returns `None` for the empty string, and when no successor exists (the
/// range is then unbounded above).
pub fn next_string(s: &str) -> Option<String> {
    let last = s.chars().next_back()?;
    let mut code = last as u32 + 1;
    // Skip the surrogate block, which has no chars.
    if (0xD800..=0xDFFF).contains(&code) {
        code = 0xE000;
    }
    let next = char::from_u32(code)?;
    let mut out = String::with_capacity(s.len() + 1);
    out.push_str(&s[..s.len() - last.len_utf8()]);
    out.push(next);
    Some(out)
}

/// Wall clock in milliseconds; swappable in tests.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

#[derive(Debug, Clone)]
pub struct ShortcutSettings {
    /// Clicks older than this are ignored and purged.
    pub retention: Duration,
    /// Cap on rows in a [`ShortcutCursor`].
    pub max_shortcuts: usize,
}

impl Default for ShortcutSettings {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(30 * 24 * 60 * 60),
            max_shortcuts: 12,
        }
    }
}

enum WriteOp {
    Click(Click),
    Refresh {
        source: String,
        shortcut_id: String,
        row: Option<Suggestion>,
    },
    Remove(String),
    Clear,
    Flush(oneshot::Sender<()>),
    Shutdown,
}

async fn run_writer(store: Arc<dyn ShortcutStore>, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        let outcome = match op {
            WriteOp::Click(click) => store
                .record_click(&click)
                .await
                .map(|_| debug!(intent_key = %click.suggestion.intent_key(), "click logged")),
            WriteOp::Refresh {
                source,
                shortcut_id,
                row,
            } => store.update_shortcut(&source, &shortcut_id, row.as_ref()).await,
            WriteOp::Remove(intent_key) => store.delete_shortcut(&intent_key).await,
            WriteOp::Clear => store.clear().await,
            WriteOp::Flush(done) => {
                let _ = done.send(());
                Ok(())
            }
            WriteOp::Shutdown => break,
        };
        if let Err(e) = outcome {
            warn!(error = %e, "click log write failed");
        }
    }
    debug!("click log writer stopped");
}

/// Persists refresh results, then forwards them.
struct PersistingListener {
    writer: mpsc::UnboundedSender<WriteOp>,
    inner: Arc<dyn ShortcutRefreshListener>,
}

impl ShortcutRefreshListener for PersistingListener {
    fn on_shortcut_refreshed(
        &self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<ListSuggestionCursor>,
    ) {
        let row = refreshed
            .as_ref()
            .filter(|c| !c.is_empty())
            .map(|c| c.suggestion_at(0).clone());
        let _ = self.writer.send(WriteOp::Refresh {
            source: source.to_string(),
            shortcut_id: shortcut_id.to_string(),
            row,
        });
        self.inner
            .on_shortcut_refreshed(source, shortcut_id, refreshed);
    }
}

/// The click log and everything derived from it.
///
/// Must be created inside a tokio runtime; it spawns the writer task.
pub struct ShortcutRepository {
    store: Arc<dyn ShortcutStore>,
    corpora: Arc<Corpora>,
    refresher: Arc<ShortcutRefresher>,
    settings: ShortcutSettings,
    clock: Clock,
    writer: mpsc::UnboundedSender<WriteOp>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
}

impl ShortcutRepository {
    pub fn new(
        store: Arc<dyn ShortcutStore>,
        corpora: Arc<Corpora>,
        refresher: Arc<ShortcutRefresher>,
        settings: ShortcutSettings,
    ) -> Self {
        let (writer, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(store.clone(), rx));
        Self {
            store,
            corpora,
            refresher,
            settings,
            clock: system_clock(),
            writer,
            writer_task: Mutex::new(Some(task)),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn refresher(&self) -> &Arc<ShortcutRefresher> {
        &self.refresher
    }

    fn retention_ms(&self) -> i64 {
        self.settings.retention.as_millis() as i64
    }

    fn submit(&self, op: WriteOp) {
        if self.writer.send(op).is_err() {
            warn!("click log writer is gone, write dropped");
        }
    }

    /// Historical shortcuts for `query` from the allowed corpora.
    ///
    /// `None` when nothing matches or the store fails. Rows whose source
    /// is no longer registered are skipped.
    pub async fn get_shortcuts_for_query(
        &self,
        query: &str,
        allowed: &[Arc<dyn Corpus>],
        listener: Arc<dyn ShortcutRefreshListener>,
    ) -> Option<ShortcutCursor> {
        let lookup = ShortcutQuery {
            query: query.to_string(),
            corpora: allowed.iter().map(|c| c.name().to_string()).collect(),
            now_ms: (self.clock)(),
            retention_ms: self.retention_ms(),
            limit: usize::MAX,
        };

        let hits = match self.store.shortcuts_for_query(&lookup).await {
            Ok(hits) => hits?,
            Err(e) => {
                warn!(query, error = %e, "shortcut lookup failed");
                return None;
            }
        };

        let rows: Vec<Suggestion> = hits
            .into_iter()
            .filter(|h| self.corpora.source(&h.suggestion.source).is_some())
            .take(self.settings.max_shortcuts)
            .map(|h| h.suggestion)
            .collect();
        if rows.is_empty() {
            return None;
        }

        debug!(query, count = rows.len(), "shortcuts found");
        let listener: Arc<dyn ShortcutRefreshListener> = Arc::new(PersistingListener {
            writer: self.writer.clone(),
            inner: listener,
        });
        Some(ShortcutCursor::new(
            query,
            rows,
            self.refresher.clone(),
            listener,
        ))
    }

    /// Log a click on `suggestion`, shown for `query`. Never fails.
    pub fn report_click(&self, query: &str, suggestion: &Suggestion) {
        if !suggestion.may_make_shortcut() {
            debug!(source = %suggestion.source, "suggestion opted out of shortcuts");
            return;
        }
        let Some(corpus) = self.corpora.corpus_for_source(&suggestion.source) else {
            warn!(source = %suggestion.source, "click on suggestion from unknown source");
            return;
        };
        if let Some(id) = &suggestion.shortcut_id {
            self.refresher.mark_shortcut_refreshed(&suggestion.source, id);
        }

        self.submit(WriteOp::Click(Click {
            suggestion: suggestion.clone(),
            query: query.to_string(),
            corpus: corpus.name().to_string(),
            hit_time_ms: (self.clock)(),
            retention_ms: self.retention_ms(),
        }));
    }

    /// Click totals for corpora with at least `min_clicks` clicks.
    pub async fn corpus_scores(&self, min_clicks: i64) -> HashMap<String, i64> {
        match self.store.corpus_scores(min_clicks).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "corpus score lookup failed");
                HashMap::new()
            }
        }
    }

    pub async fn has_history(&self) -> bool {
        self.store.has_history().await.unwrap_or_else(|e| {
            warn!(error = %e, "history lookup failed");
            false
        })
    }

    pub fn remove_from_history(&self, suggestion: &Suggestion) {
        self.submit(WriteOp::Remove(suggestion.intent_key()));
    }

    pub fn clear_history(&self) {
        info!("clearing click history");
        self.refresher.reset();
        self.submit(WriteOp::Clear);
    }

    /// Wait until every write submitted so far has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.submit(WriteOp::Flush(tx));
        let _ = rx.await;
    }

    /// Apply pending writes and stop the writer task.
    pub async fn close(&self) {
        self.submit(WriteOp::Shutdown);
        let task = self
            .writer_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "click log writer panicked");
            }
        }
    }
}
