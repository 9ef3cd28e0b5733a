//! Promoters pick the merged top-N list shown for a query.
//!
//! A [`Promoter`] only appends to the promoted accumulator. Deduplication
//! is the accumulator's job (see
//! [`ListSuggestionCursor::without_duplicates`]), so promoters count a row
//! only when the accumulator accepted it.
//!
//! Corpus results are read through local read heads; the result cursors
//! themselves are never moved.

use crate::corpus::CorpusResult;
use crate::cursor::{ListSuggestionCursor, SuggestionCursor, SuggestionPosition};
use crate::models::Suggestion;

pub trait Promoter: Send + Sync {
    /// Append up to `max_promoted - promoted.count()` rows to `promoted`.
    fn pick_promoted(
        &self,
        shortcuts: Option<&dyn SuggestionCursor>,
        results: &[CorpusResult],
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    );
}

/// Add up to `limit` shortcut rows. Returns how many were accepted.
fn promote_shortcuts(
    shortcuts: Option<&dyn SuggestionCursor>,
    limit: usize,
    promoted: &mut ListSuggestionCursor,
) -> usize {
    let Some(shortcuts) = shortcuts else {
        return 0;
    };
    let mut added = 0;
    for position in 0..shortcuts.count() {
        if added >= limit {
            break;
        }
        let row = SuggestionPosition::new(shortcuts, position);
        if promoted.add(row.suggestion().clone()) {
            added += 1;
        }
    }
    added
}

/// Shortcuts first, then every corpus result in corpus order.
pub struct ConcatPromoter {
    max_shortcuts: usize,
}

impl ConcatPromoter {
    pub fn new(max_shortcuts: usize) -> Self {
        Self { max_shortcuts }
    }
}

impl Promoter for ConcatPromoter {
    fn pick_promoted(
        &self,
        shortcuts: Option<&dyn SuggestionCursor>,
        results: &[CorpusResult],
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        let room = max_promoted.saturating_sub(promoted.count());
        promote_shortcuts(shortcuts, self.max_shortcuts.min(room), promoted);

        for result in results {
            for position in 0..result.count() {
                if promoted.count() >= max_promoted {
                    return;
                }
                let row = SuggestionPosition::new(result, position);
                promoted.add(row.suggestion().clone());
            }
        }
    }
}

/// Read head over one corpus result.
struct Reader<'a> {
    result: &'a CorpusResult,
    next: usize,
}

impl Reader<'_> {
    fn exhausted(&self) -> bool {
        self.next >= self.result.count()
    }

    /// Add up to `max_to_add` unseen rows. Returns how many were accepted.
    fn promote(&mut self, max_to_add: usize, promoted: &mut ListSuggestionCursor) -> usize {
        let mut added = 0;
        while added < max_to_add && !self.exhausted() {
            let row = SuggestionPosition::new(self.result, self.next);
            if promoted.add(row.suggestion().clone()) {
                added += 1;
            }
            self.next += 1;
        }
        added
    }
}

/// One pass over `readers`, each contributing at most `stripe` rows,
/// until `max_to_add` rows were added. Exhausted readers are dropped.
fn round_robin(
    readers: &mut Vec<Reader<'_>>,
    max_to_add: usize,
    stripe: usize,
    promoted: &mut ListSuggestionCursor,
) -> usize {
    let mut count = 0;
    if max_to_add == 0 {
        return 0;
    }
    let mut i = 0;
    while count < max_to_add && i < readers.len() {
        let reader = &mut readers[i];
        count += reader.promote(stripe.min(max_to_add - count), promoted);
        if reader.exhausted() {
            readers.remove(i);
        } else {
            i += 1;
        }
    }
    count
}

/// Round-robin promoter aware of corpus rank.
///
/// After shortcuts, the slots above the keyboard are shared in equal
/// stripes among default-enabled corpora, remaining slots go to the same
/// corpora again, and whatever is left goes to the other corpora.
pub struct RankAwarePromoter {
    slots_above_keyboard: usize,
    max_shortcuts: usize,
}

impl RankAwarePromoter {
    pub fn new(slots_above_keyboard: usize, max_shortcuts: usize) -> Self {
        Self {
            slots_above_keyboard,
            max_shortcuts,
        }
    }

    fn fill(
        readers: &mut Vec<Reader<'_>>,
        mut budget: usize,
        promoted: &mut ListSuggestionCursor,
    ) -> usize {
        if budget == 0 || readers.is_empty() {
            return budget;
        }
        let stripe = (budget / readers.len()).max(1);
        budget -= round_robin(readers, budget, stripe, promoted);
        // Integer division may leave slots; top up with exactly what is left.
        budget -= round_robin(readers, budget, budget, promoted);
        budget
    }
}

impl Promoter for RankAwarePromoter {
    fn pick_promoted(
        &self,
        shortcuts: Option<&dyn SuggestionCursor>,
        results: &[CorpusResult],
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        let room = max_promoted.saturating_sub(promoted.count());
        promote_shortcuts(shortcuts, self.max_shortcuts.min(room), promoted);
        let mut budget = max_promoted.saturating_sub(promoted.count());

        let (mut default, mut other): (Vec<Reader<'_>>, Vec<Reader<'_>>) = results
            .iter()
            .filter(|r| !r.is_empty())
            .map(|result| Reader { result, next: 0 })
            .partition(|r| r.result.corpus().is_default_enabled());

        if budget > 0 && !default.is_empty() {
            let slots_to_fill = self
                .slots_above_keyboard
                .saturating_sub(promoted.count())
                .min(budget);
            if slots_to_fill > 0 {
                let stripe = (slots_to_fill / default.len()).max(1);
                budget -= round_robin(&mut default, slots_to_fill, stripe, promoted);
            }
        }

        budget = Self::fill(&mut default, budget, promoted);
        Self::fill(&mut other, budget, promoted);
    }
}

/// Filters shortcuts through a predicate, then delegates.
///
/// Accepted shortcuts go first, up to `max_promoted`; the wrapped
/// promoter sees no shortcuts and ranks live results as usual.
pub struct ShortcutPromoter<P> {
    inner: P,
    accept: Box<dyn Fn(&Suggestion) -> bool + Send + Sync>,
}

impl<P: Promoter> ShortcutPromoter<P> {
    pub fn new<F>(inner: P, accept: F) -> Self
    where
        F: Fn(&Suggestion) -> bool + Send + Sync + 'static,
    {
        Self {
            inner,
            accept: Box::new(accept),
        }
    }
}

impl<P: Promoter> Promoter for ShortcutPromoter<P> {
    fn pick_promoted(
        &self,
        shortcuts: Option<&dyn SuggestionCursor>,
        results: &[CorpusResult],
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        if let Some(shortcuts) = shortcuts {
            for position in 0..shortcuts.count() {
                if promoted.count() >= max_promoted {
                    break;
                }
                let row = SuggestionPosition::new(shortcuts, position).suggestion();
                if (self.accept)(row) {
                    promoted.add(row.clone());
                }
            }
        }
        self.inner.pick_promoted(None, results, max_promoted, promoted);
    }
}

impl Promoter for Box<dyn Promoter> {
    fn pick_promoted(
        &self,
        shortcuts: Option<&dyn SuggestionCursor>,
        results: &[CorpusResult],
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        (**self).pick_promoted(shortcuts, results, max_promoted, promoted)
    }
}
