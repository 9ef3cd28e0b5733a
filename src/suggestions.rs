//! The per-query result aggregate.
//!
//! A [`Suggestions`] collects the [`CorpusResult`]s and the shortcuts of
//! one in-flight query and exposes a lazily computed promoted list. It
//! has no internal locking: every mutation takes `&mut self`, and its
//! single owner (the provider task) is the only writer.
//!
//! # Lifecycle
//!
//! Holders call [`acquire`](Suggestions::acquire) and
//! [`release`](Suggestions::release). The count reaches zero exactly once,
//! and that transition closes the aggregate and every cursor it holds.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error};

use crate::corpus::{Corpus, CorpusResult};
use crate::cursor::{DataSetObservable, DataSetObserver, ListSuggestionCursor, SuggestionCursor};
use crate::promoter::Promoter;
use crate::shortcuts::ShortcutCursor;

struct Promoted {
    max_promoted: usize,
    cursor: ListSuggestionCursor,
}

pub struct Suggestions {
    query: String,
    expected: Vec<Arc<dyn Corpus>>,
    results: Vec<CorpusResult>,
    reported: HashSet<String>,
    web_result: Option<usize>,
    shortcuts: Option<ShortcutCursor>,
    shortcuts_set: bool,
    promoted: Option<Promoted>,
    observers: DataSetObservable,
    ref_count: usize,
    closed: bool,
}

impl Suggestions {
    pub fn new(query: impl Into<String>, expected: Vec<Arc<dyn Corpus>>) -> Self {
        Self {
            query: query.into(),
            expected,
            results: Vec::new(),
            reported: HashSet::new(),
            web_result: None,
            shortcuts: None,
            shortcuts_set: false,
            promoted: None,
            observers: DataSetObservable::new(),
            ref_count: 0,
            closed: false,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn expected_corpora(&self) -> &[Arc<dyn Corpus>] {
        &self.expected
    }

    /// Number of distinct corpora that have reported.
    pub fn result_count(&self) -> usize {
        self.reported.len()
    }

    /// Results in arrival order.
    pub fn results(&self) -> &[CorpusResult] {
        self.assert_open();
        &self.results
    }

    pub fn web_result(&self) -> Option<&CorpusResult> {
        self.web_result.map(|i| &self.results[i])
    }

    pub fn shortcuts(&self) -> Option<&ShortcutCursor> {
        self.shortcuts.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.reported.len() >= self.expected.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    pub fn acquire(&mut self) {
        self.assert_open();
        self.ref_count += 1;
    }

    /// Drop one hold. Returns `true` if this closed the aggregate.
    pub fn release(&mut self) -> bool {
        assert!(
            self.ref_count > 0,
            "suggestions for {:?} released more often than acquired",
            self.query
        );
        self.ref_count -= 1;
        if self.ref_count == 0 {
            self.close();
            true
        } else {
            false
        }
    }

    /// Append a result. A closed aggregate closes `result` instead.
    ///
    /// Panics if `result` is for another query.
    pub fn add_corpus_result(&mut self, mut result: CorpusResult) {
        if self.closed {
            debug!(query = %self.query, corpus = result.corpus().name(), "result for closed suggestions");
            result.close();
            return;
        }
        assert_eq!(
            result.user_query(),
            self.query,
            "corpus result for a different query"
        );

        self.reported.insert(result.corpus().name().to_string());
        if result.corpus().is_web_corpus() {
            self.web_result = Some(self.results.len());
        }
        self.results.push(result);
        self.invalidate_promoted();
        self.observers.notify_changed();
    }

    /// Set the shortcuts cursor. Only once; a closed aggregate closes it.
    pub fn set_shortcuts(&mut self, mut shortcuts: ShortcutCursor) {
        if self.closed {
            shortcuts.close();
            return;
        }
        assert!(!self.shortcuts_set, "shortcuts already set");
        assert_eq!(
            shortcuts.user_query(),
            self.query,
            "shortcuts for a different query"
        );
        self.shortcuts_set = true;
        self.shortcuts = Some(shortcuts);
        self.invalidate_promoted();
        self.observers.notify_changed();
    }

    /// Route a shortcut refresh to the shortcuts cursor.
    pub fn refresh_shortcut(
        &mut self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<ListSuggestionCursor>,
    ) {
        match self.shortcuts.as_mut() {
            Some(shortcuts) if !self.closed => {
                shortcuts.refresh(source, shortcut_id, refreshed);
                self.invalidate_promoted();
                self.observers.notify_changed();
            }
            _ => {
                if let Some(mut cursor) = refreshed {
                    cursor.close();
                }
            }
        }
    }

    /// The deduplicated top-`max_promoted` list, cached until the
    /// aggregate changes.
    ///
    /// Building the list starts a refresh for every promoted shortcut.
    pub fn get_promoted(
        &mut self,
        promoter: &dyn Promoter,
        max_promoted: usize,
    ) -> &ListSuggestionCursor {
        self.assert_open();
        let stale = self
            .promoted
            .as_ref()
            .map_or(true, |p| p.max_promoted != max_promoted);
        if stale {
            self.invalidate_promoted();
            let mut cursor = ListSuggestionCursor::without_duplicates(self.query.clone());
            promoter.pick_promoted(
                self.shortcuts.as_ref().map(|s| s as &dyn SuggestionCursor),
                &self.results,
                max_promoted,
                &mut cursor,
            );
            self.refresh_promoted_shortcuts(&cursor);
            self.promoted = Some(Promoted {
                max_promoted,
                cursor,
            });
        }
        match &self.promoted {
            Some(p) => &p.cursor,
            None => unreachable!("promoted list was just built"),
        }
    }

    fn refresh_promoted_shortcuts(&self, promoted: &ListSuggestionCursor) {
        let Some(shortcuts) = self.shortcuts.as_ref() else {
            return;
        };
        for row in promoted.iter().filter(|s| s.is_shortcut) {
            let position = (0..shortcuts.count()).find(|&i| {
                let s = shortcuts.suggestion_at(i);
                s.source == row.source && s.shortcut_id == row.shortcut_id
            });
            if let Some(position) = position {
                shortcuts.refresh_row(position);
            }
        }
    }

    fn invalidate_promoted(&mut self) {
        if let Some(mut p) = self.promoted.take() {
            p.cursor.close();
        }
    }

    pub fn register_observer(&mut self, observer: Arc<dyn DataSetObserver>) {
        self.observers.register(observer);
    }

    pub fn unregister_observer(&mut self, observer: &Arc<dyn DataSetObserver>) {
        self.observers.unregister(observer);
    }

    /// Close every held cursor and unregister observers. Closing twice panics.
    pub fn close(&mut self) {
        assert!(!self.closed, "suggestions for {:?} closed twice", self.query);
        self.closed = true;
        for result in &mut self.results {
            result.close();
        }
        if let Some(shortcuts) = self.shortcuts.as_mut() {
            shortcuts.close();
        }
        self.invalidate_promoted();
        self.observers.notify_invalidated();
        self.observers.clear();
        debug!(query = %self.query, results = self.results.len(), "suggestions closed");
    }

    fn assert_open(&self) {
        assert!(!self.closed, "suggestions for {:?} used after close", self.query);
    }
}

impl Drop for Suggestions {
    fn drop(&mut self) {
        if !self.closed && !std::thread::panicking() {
            error!(
                query = %self.query,
                ref_count = self.ref_count,
                "suggestions dropped without close()"
            );
        }
    }
}
