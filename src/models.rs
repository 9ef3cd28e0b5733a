//! Core data models used throughout quicksearch.
//!
//! These types represent the suggestion rows that sources produce and that
//! flow through aggregation, promotion, and click logging.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Shortcut id a source uses to say "never turn this row into a shortcut".
pub const NEVER_MAKE_SHORTCUT: &str = "_-1";

/// Default action for suggestions whose source did not set one.
pub const DEFAULT_ACTION: &str = "search";

/// Action descriptor: what launching a suggestion would do.
///
/// Together with the user query this is what makes two rows "the same
/// result" for deduplication and for click logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub action: String,
    pub data: Option<String>,
    pub extra_data: Option<String>,
    /// Query the suggestion would rewrite the search box to, if any.
    pub query: Option<String>,
}

impl Default for Intent {
    fn default() -> Self {
        Self {
            action: DEFAULT_ACTION.to_string(),
            data: None,
            extra_data: None,
            query: None,
        }
    }
}

/// One result row produced by a source.
///
/// Suggestions are immutable once produced. A shortcut refresh replaces a
/// row with a new value; nothing mutates a row in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Name of the source that produced the row.
    pub source: String,
    /// Version stamp of the source at the time the row was produced.
    pub source_version: i64,
    pub text1: String,
    pub text2: Option<String>,
    pub text2_url: Option<String>,
    pub icon1: Option<String>,
    pub icon2: Option<String>,
    pub intent: Intent,
    pub shortcut_id: Option<String>,
    /// True when the row came from the click log rather than a live query.
    pub is_shortcut: bool,
    pub log_type: Option<String>,
}

impl Suggestion {
    pub fn new(source: impl Into<String>, text1: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_version: 0,
            text1: text1.into(),
            text2: None,
            text2_url: None,
            icon1: None,
            icon2: None,
            intent: Intent::default(),
            shortcut_id: None,
            is_shortcut: false,
            log_type: None,
        }
    }

    pub fn with_text2(mut self, text2: impl Into<String>) -> Self {
        self.text2 = Some(text2.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.intent.action = action.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.intent.data = Some(data.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.intent.query = Some(query.into());
        self
    }

    pub fn with_shortcut_id(mut self, id: impl Into<String>) -> Self {
        self.shortcut_id = Some(id.into());
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.source_version = version;
        self
    }

    pub fn as_shortcut(mut self) -> Self {
        self.is_shortcut = true;
        self
    }

    /// Stable content fingerprint used to deduplicate promoted rows.
    ///
    /// Derived from action, data and rewrite query only, so the same
    /// target reported by a live source and by the click log collapses
    /// into one entry.
    pub fn key(&self) -> SuggestionKey {
        let mut hasher = Sha256::new();
        hasher.update(self.intent.action.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.intent.data.as_deref().unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(self.intent.query.as_deref().unwrap_or("").as_bytes());
        SuggestionKey(hex::encode(hasher.finalize()))
    }

    /// Composite key identifying a clickable target in the click log.
    pub fn intent_key(&self) -> String {
        format!(
            "{}#{}#{}#{}",
            self.source,
            self.intent.data.as_deref().unwrap_or(""),
            self.intent.action,
            self.intent.query.as_deref().unwrap_or("")
        )
    }

    /// Whether clicking this row may create a stored shortcut.
    pub fn may_make_shortcut(&self) -> bool {
        self.shortcut_id.as_deref() != Some(NEVER_MAKE_SHORTCUT)
    }
}

/// Deduplication key of a [`Suggestion`]; see [`Suggestion::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SuggestionKey(String);

impl SuggestionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
