//! Hand-off from worker tasks to the provider task.
//!
//! ```text
//!  query workers ──QueryConsumer──┐
//!                                 ├──► mpsc<Delivery> ──► SuggestionsProvider
//!  refresh workers ─RefreshConsumer┘        (single reader, owns Suggestions)
//! ```
//!
//! Every delivery is tagged with the id of the query it belongs to, and
//! the provider discards deliveries for superseded queries. Once a query
//! is cancelled its consumers close what they are handed, except empty
//! corpus results, which still travel so zero-result tracking sees them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::corpus::CorpusResult;
use crate::cursor::{ListSuggestionCursor, SuggestionCursor};
use crate::query_task::Consumer;
use crate::shortcuts::ShortcutRefreshListener;

pub type QueryId = u64;

/// A value published to the provider task.
pub enum Delivery {
    CorpusResult {
        query_id: QueryId,
        result: CorpusResult,
    },
    ShortcutRefreshed {
        query_id: QueryId,
        source: String,
        shortcut_id: String,
        refreshed: Option<ListSuggestionCursor>,
    },
}

impl Delivery {
    pub fn query_id(&self) -> QueryId {
        match self {
            Delivery::CorpusResult { query_id, .. } => *query_id,
            Delivery::ShortcutRefreshed { query_id, .. } => *query_id,
        }
    }

    /// Close every cursor carried by this delivery.
    pub fn discard(self) {
        match self {
            Delivery::CorpusResult { mut result, .. } => result.close(),
            Delivery::ShortcutRefreshed { refreshed, .. } => {
                if let Some(mut cursor) = refreshed {
                    cursor.close();
                }
            }
        }
    }
}

/// Sending half shared by the consumers of one query.
#[derive(Clone)]
pub struct Publisher {
    query_id: QueryId,
    cancelled: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl Publisher {
    pub fn new(query_id: QueryId, tx: mpsc::UnboundedSender<Delivery>) -> Self {
        Self {
            query_id,
            cancelled: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    /// Stop publishing. Later deliveries are discarded at the source.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn publish(&self, delivery: Delivery) -> bool {
        if self.is_cancelled() && !is_zero_result(&delivery) {
            trace!(query_id = self.query_id, "query cancelled, delivery discarded");
            delivery.discard();
            return false;
        }
        match self.tx.send(delivery) {
            Ok(()) => true,
            Err(mpsc::error::SendError(delivery)) => {
                delivery.discard();
                false
            }
        }
    }
}

fn is_zero_result(delivery: &Delivery) -> bool {
    matches!(delivery, Delivery::CorpusResult { result, .. } if result.is_empty())
}

/// Publishes corpus results of one query.
pub struct QueryConsumer(pub Publisher);

impl Consumer<CorpusResult> for QueryConsumer {
    fn consume(&self, result: CorpusResult) -> bool {
        self.0.publish(Delivery::CorpusResult {
            query_id: self.0.query_id,
            result,
        })
    }
}

/// Publishes shortcut refreshes of one query.
pub struct RefreshConsumer(pub Publisher);

impl ShortcutRefreshListener for RefreshConsumer {
    fn on_shortcut_refreshed(
        &self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<ListSuggestionCursor>,
    ) {
        self.0.publish(Delivery::ShortcutRefreshed {
            query_id: self.0.query_id,
            source: source.to_string(),
            shortcut_id: shortcut_id.to_string(),
            refreshed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promoter::tests::{corpus, result};

    #[test]
    fn test_publishes_tagged_deliveries() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let publisher = Publisher::new(7, tx);
        let a = corpus("a", true);
        assert!(QueryConsumer(publisher.clone()).consume(result(&a, "q", 2)));
        RefreshConsumer(publisher).on_shortcut_refreshed("a", "x", None);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.query_id(), 7);
        assert!(matches!(first, Delivery::CorpusResult { ref result, .. } if result.count() == 2));
        first.discard();
        match rx.try_recv().unwrap() {
            Delivery::ShortcutRefreshed { source, shortcut_id, refreshed, .. } => {
                assert_eq!((source.as_str(), shortcut_id.as_str()), ("a", "x"));
                assert!(refreshed.is_none());
            }
            other => panic!("unexpected delivery for query {}", other.query_id()),
        }
    }

    #[test]
    fn test_cancelled_publisher_rejects() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let publisher = Publisher::new(1, tx);
        publisher.cancel();
        let a = corpus("a", true);
        assert!(!QueryConsumer(publisher).consume(result(&a, "q", 1)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancelled_publisher_still_sends_zero_results() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let publisher = Publisher::new(3, tx);
        publisher.cancel();
        let a = corpus("a", true);
        assert!(QueryConsumer(publisher.clone()).consume(result(&a, "q", 0)));
        RefreshConsumer(publisher).on_shortcut_refreshed("a", "x", None);

        let delivery = rx.try_recv().unwrap();
        assert_eq!(delivery.query_id(), 3);
        assert!(matches!(delivery, Delivery::CorpusResult { ref result, .. } if result.is_empty()));
        delivery.discard();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_rejects() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let a = corpus("a", true);
        assert!(!QueryConsumer(Publisher::new(1, tx)).consume(result(&a, "q", 1)));
    }
}
