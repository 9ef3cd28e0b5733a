use std::sync::Arc;

use tracing::{debug, error};

use crate::cursor::{DataSetObserver, ListSuggestionCursor, SuggestionCursor};
use crate::models::Suggestion;

use super::refresher::{ShortcutRefreshListener, ShortcutRefresher};

/// Historical shortcuts for one query, updated in place as refreshes
/// come back.
///
/// Owns every refreshed-result cursor handed to [`refresh`] and closes
/// them together with itself.
///
/// [`refresh`]: ShortcutCursor::refresh
pub struct ShortcutCursor {
    rows: ListSuggestionCursor,
    refreshed: Vec<ListSuggestionCursor>,
    refresher: Arc<ShortcutRefresher>,
    listener: Arc<dyn ShortcutRefreshListener>,
}

impl ShortcutCursor {
    pub fn new(
        user_query: impl Into<String>,
        rows: Vec<Suggestion>,
        refresher: Arc<ShortcutRefresher>,
        listener: Arc<dyn ShortcutRefreshListener>,
    ) -> Self {
        Self {
            rows: ListSuggestionCursor::from_rows(user_query, rows),
            refreshed: Vec::new(),
            refresher,
            listener,
        }
    }

    /// Kick off an asynchronous refresh of the row at `position`.
    pub fn refresh_row(&self, position: usize) {
        let shortcut = self.rows.suggestion_at(position);
        if self.refresher.should_refresh(shortcut) {
            self.refresher.refresh(shortcut, self.listener.clone());
        }
    }

    /// Apply a refresh result to the row `(source, shortcut_id)`.
    ///
    /// A non-empty `refreshed` replaces the row with its first row; `None`
    /// or an empty cursor removes it. After close this only closes
    /// `refreshed`.
    pub fn refresh(
        &mut self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<ListSuggestionCursor>,
    ) {
        if self.rows.is_closed() {
            if let Some(mut cursor) = refreshed {
                cursor.close();
            }
            return;
        }

        let position = self
            .rows
            .iter()
            .position(|s| s.source == source && s.shortcut_id.as_deref() == Some(shortcut_id));
        let Some(position) = position else {
            debug!(source, shortcut_id, "refreshed shortcut not in cursor");
            if let Some(mut cursor) = refreshed {
                cursor.close();
            }
            return;
        };

        match refreshed {
            Some(cursor) if !cursor.is_empty() => {
                let replacement = cursor.suggestion_at(0).clone().as_shortcut();
                self.rows.replace(position, replacement);
                self.refreshed.push(cursor);
            }
            other => {
                if let Some(cursor) = other {
                    self.refreshed.push(cursor);
                }
                self.rows.remove(position);
            }
        }
        self.rows.notify_changed();
    }
}

impl SuggestionCursor for ShortcutCursor {
    fn user_query(&self) -> &str {
        self.rows.user_query()
    }

    fn count(&self) -> usize {
        self.rows.count()
    }

    fn suggestion_at(&self, position: usize) -> &Suggestion {
        self.rows.suggestion_at(position)
    }

    fn position(&self) -> usize {
        self.rows.position()
    }

    fn move_to(&mut self, position: usize) -> bool {
        self.rows.move_to(position)
    }

    fn close(&mut self) {
        self.rows.close();
        for mut cursor in self.refreshed.drain(..) {
            cursor.close();
        }
    }

    fn is_closed(&self) -> bool {
        self.rows.is_closed()
    }

    fn register_observer(&mut self, observer: Arc<dyn DataSetObserver>) {
        self.rows.register_observer(observer)
    }

    fn unregister_observer(&mut self, observer: &Arc<dyn DataSetObserver>) {
        self.rows.unregister_observer(observer)
    }
}

impl Drop for ShortcutCursor {
    fn drop(&mut self) {
        if !self.rows.is_closed() && !std::thread::panicking() {
            error!(
                query = %self.rows.user_query(),
                "shortcut cursor dropped without close()"
            );
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpora;
    use crate::cursor::tests::CountingObserver;
    use crate::executor::PooledTaskExecutor;
    use crate::shortcuts::refresher::tests::ChannelListener;

    fn cursor(rows: Vec<Suggestion>) -> ShortcutCursor {
        let refresher = Arc::new(ShortcutRefresher::new(
            Arc::new(PooledTaskExecutor::new("refresh", 1)),
            Arc::new(Corpora::new()),
        ));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        ShortcutCursor::new("q", rows, refresher, Arc::new(ChannelListener(tx)))
    }

    fn shortcut(source: &str, id: &str) -> Suggestion {
        Suggestion::new(source, id)
            .with_data(format!("{}/{}", source, id))
            .with_shortcut_id(id)
            .as_shortcut()
    }

    #[tokio::test]
    async fn test_refresh_with_none_removes_row_and_notifies_once() {
        let mut c = cursor(vec![shortcut("S", "w"), shortcut("S", "x"), shortcut("S", "y")]);
        let observer = Arc::new(CountingObserver::default());
        c.register_observer(observer.clone());

        c.refresh("S", "x", None);
        assert_eq!(c.count(), 2);
        assert_eq!(c.suggestion_at(0).text1, "w");
        assert_eq!(c.suggestion_at(1).text1, "y");
        assert_eq!(observer.changed(), 1);
        c.close();
    }

    #[tokio::test]
    async fn test_refresh_with_rows_replaces_in_place() {
        let mut c = cursor(vec![shortcut("S", "w"), shortcut("S", "x"), shortcut("S", "y")]);
        let observer = Arc::new(CountingObserver::default());
        c.register_observer(observer.clone());

        let fresh = ListSuggestionCursor::from_rows(
            "",
            vec![Suggestion::new("S", "x renamed").with_shortcut_id("x")],
        );
        c.refresh("S", "x", Some(fresh));
        assert_eq!(c.count(), 3);
        assert_eq!(c.suggestion_at(1).text1, "x renamed");
        assert!(c.suggestion_at(1).is_shortcut);
        assert_eq!(observer.changed(), 1);
        c.close();
    }

    #[tokio::test]
    async fn test_empty_refresh_removes_row() {
        let mut c = cursor(vec![shortcut("S", "x")]);
        c.refresh("S", "x", Some(ListSuggestionCursor::new("")));
        assert!(c.is_empty());
        c.close();
    }

    #[tokio::test]
    async fn test_refresh_after_close_only_closes_argument() {
        let mut c = cursor(vec![shortcut("S", "x")]);
        c.close();
        let fresh = ListSuggestionCursor::from_rows("", vec![Suggestion::new("S", "new")]);
        c.refresh("S", "x", Some(fresh));
        c.refresh("S", "x", None);
        assert!(c.is_closed());
    }

    #[tokio::test]
    #[should_panic(expected = "closed twice")]
    async fn test_double_close_panics() {
        let mut c = cursor(vec![]);
        c.close();
        c.close();
    }
}
