//! Positionable, closable views over ordered suggestion rows.
//!
//! A [`SuggestionCursor`] is what every stage of the pipeline hands to the
//! next: sources produce [`ListSuggestionCursor`]s, the shortcut repository
//! produces [`ShortcutCursor`](crate::shortcuts::ShortcutCursor)s, and the
//! promoter writes into a deduplicating [`ListSuggestionCursor`].
//!
//! # Contract
//!
//! - Reading a row requires a position in `[0, count)`.
//! - Reading after [`close`](SuggestionCursor::close) is a programming error.
//! - Closing twice is a programming error.
//!
//! All three are enforced with panics. Dropping a cursor that was never
//! closed is logged at `error` level so leaks show up in the logs.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::error;

use crate::models::{Suggestion, SuggestionKey};

/// Change notification sink for cursors and aggregates.
///
/// Observers are called synchronously on the thread that mutates the
/// observed value and must not block.
pub trait DataSetObserver: Send + Sync {
    /// The visible content changed.
    fn on_changed(&self);

    /// The observed value was closed and must no longer be read.
    fn on_invalidated(&self) {}
}

/// Ordered list of registered observers.
#[derive(Default)]
pub struct DataSetObservable {
    observers: Vec<Arc<dyn DataSetObserver>>,
}

impl DataSetObservable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Registering the same observer twice panics.
    pub fn register(&mut self, observer: Arc<dyn DataSetObserver>) {
        assert!(
            !self.observers.iter().any(|o| Arc::ptr_eq(o, &observer)),
            "observer is already registered"
        );
        self.observers.push(observer);
    }

    /// Unregister an observer; unknown observers are ignored.
    pub fn unregister(&mut self, observer: &Arc<dyn DataSetObserver>) {
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
    }

    pub fn notify_changed(&self) {
        for observer in &self.observers {
            observer.on_changed();
        }
    }

    pub fn notify_invalidated(&self) {
        for observer in &self.observers {
            observer.on_invalidated();
        }
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// A positionable, closable view over an ordered sequence of suggestions.
pub trait SuggestionCursor: Send {
    /// The user query this cursor holds results for.
    fn user_query(&self) -> &str;

    /// Number of rows.
    fn count(&self) -> usize;

    /// Row at `position`. Panics if out of range or closed.
    fn suggestion_at(&self, position: usize) -> &Suggestion;

    /// Current position.
    fn position(&self) -> usize;

    /// Move to `position`; returns `false` (and stays put) if out of range.
    fn move_to(&mut self, position: usize) -> bool;

    fn close(&mut self);

    fn is_closed(&self) -> bool;

    fn register_observer(&mut self, observer: Arc<dyn DataSetObserver>);

    fn unregister_observer(&mut self, observer: &Arc<dyn DataSetObserver>);

    /// Row at the current position.
    fn current(&self) -> &Suggestion {
        self.suggestion_at(self.position())
    }

    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Zero-copy view of one row of another cursor.
///
/// Identity is `(cursor, position)` captured at wrap time; the position
/// is never live-tracked.
#[derive(Clone, Copy)]
pub struct SuggestionPosition<'a> {
    cursor: &'a dyn SuggestionCursor,
    position: usize,
}

impl<'a> SuggestionPosition<'a> {
    /// Wrap the cursor's current row.
    pub fn current(cursor: &'a dyn SuggestionCursor) -> Self {
        Self::new(cursor, cursor.position())
    }

    pub fn new(cursor: &'a dyn SuggestionCursor, position: usize) -> Self {
        Self { cursor, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn suggestion(&self) -> &'a Suggestion {
        self.cursor.suggestion_at(self.position)
    }
}

impl PartialEq for SuggestionPosition<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(self.cursor, other.cursor) && self.position == other.position
    }
}

impl Eq for SuggestionPosition<'_> {}

impl std::fmt::Debug for SuggestionPosition<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionPosition")
            .field("query", &self.cursor.user_query())
            .field("position", &self.position)
            .finish()
    }
}

/// Materialized, list-backed cursor.
///
/// Created with [`without_duplicates`](ListSuggestionCursor::without_duplicates)
/// it becomes the promoted-list accumulator: [`add`](ListSuggestionCursor::add)
/// refuses any row whose [`SuggestionKey`] is already present.
pub struct ListSuggestionCursor {
    user_query: String,
    rows: Vec<Suggestion>,
    seen: Option<HashSet<SuggestionKey>>,
    position: usize,
    closed: bool,
    observers: DataSetObservable,
}

impl ListSuggestionCursor {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            rows: Vec::new(),
            seen: None,
            position: 0,
            closed: false,
            observers: DataSetObservable::new(),
        }
    }

    pub fn from_rows(user_query: impl Into<String>, rows: Vec<Suggestion>) -> Self {
        let mut cursor = Self::new(user_query);
        cursor.rows = rows;
        cursor
    }

    /// A cursor that silently drops rows whose key it already holds.
    pub fn without_duplicates(user_query: impl Into<String>) -> Self {
        let mut cursor = Self::new(user_query);
        cursor.seen = Some(HashSet::new());
        cursor
    }

    /// Append a row. Returns `false` if the row was dropped as a duplicate.
    pub fn add(&mut self, suggestion: Suggestion) -> bool {
        self.assert_open();
        if let Some(seen) = self.seen.as_mut() {
            if !seen.insert(suggestion.key()) {
                return false;
            }
        }
        self.rows.push(suggestion);
        true
    }

    /// Replace the row at `position`, keeping its place in the list.
    ///
    /// On a deduplicating cursor, a replacement whose key another row
    /// already holds removes the row at `position` instead.
    pub fn replace(&mut self, position: usize, suggestion: Suggestion) -> Suggestion {
        self.assert_open();
        let old_key = self.rows[position].key();
        let new_key = suggestion.key();
        if let Some(seen) = self.seen.as_mut() {
            if new_key != old_key && seen.contains(&new_key) {
                return self.remove(position);
            }
            seen.remove(&old_key);
            seen.insert(new_key);
        }
        std::mem::replace(&mut self.rows[position], suggestion)
    }

    /// Remove the row at `position`; the current position is clamped.
    pub fn remove(&mut self, position: usize) -> Suggestion {
        self.assert_open();
        let removed = self.rows.remove(position);
        if let Some(seen) = self.seen.as_mut() {
            seen.remove(&removed.key());
        }
        if self.position >= self.rows.len() {
            self.position = self.rows.len().saturating_sub(1);
        }
        removed
    }

    pub fn rows(&self) -> &[Suggestion] {
        self.assert_open();
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Suggestion> {
        self.rows().iter()
    }

    pub fn notify_changed(&self) {
        self.observers.notify_changed();
    }

    fn assert_open(&self) {
        assert!(
            !self.closed,
            "cursor for query {:?} used after close",
            self.user_query
        );
    }
}

impl SuggestionCursor for ListSuggestionCursor {
    fn user_query(&self) -> &str {
        &self.user_query
    }

    fn count(&self) -> usize {
        self.assert_open();
        self.rows.len()
    }

    fn suggestion_at(&self, position: usize) -> &Suggestion {
        self.assert_open();
        assert!(
            position < self.rows.len(),
            "position {} out of range [0, {})",
            position,
            self.rows.len()
        );
        &self.rows[position]
    }

    fn position(&self) -> usize {
        self.position
    }

    fn move_to(&mut self, position: usize) -> bool {
        self.assert_open();
        if position < self.rows.len() {
            self.position = position;
            true
        } else {
            false
        }
    }

    fn close(&mut self) {
        assert!(
            !self.closed,
            "cursor for query {:?} closed twice",
            self.user_query
        );
        self.closed = true;
        self.observers.notify_invalidated();
        self.observers.clear();
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn register_observer(&mut self, observer: Arc<dyn DataSetObserver>) {
        self.observers.register(observer);
    }

    fn unregister_observer(&mut self, observer: &Arc<dyn DataSetObserver>) {
        self.observers.unregister(observer);
    }
}

impl Drop for ListSuggestionCursor {
    fn drop(&mut self) {
        if !self.closed && !std::thread::panicking() {
            error!(
                query = %self.user_query,
                rows = self.rows.len(),
                "suggestion cursor dropped without close()"
            );
        }
    }
}

impl std::fmt::Debug for ListSuggestionCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListSuggestionCursor")
            .field("user_query", &self.user_query)
            .field("rows", &self.rows.len())
            .field("closed", &self.closed)
            .finish()
    }
}
