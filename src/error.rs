//! Typed errors surfaced by sources.
//!
//! Application-level functions return [`anyhow::Result`]; the source layer
//! uses [`SourceError`] so query and refresh tasks can log what went wrong
//! before converting the failure into an empty result.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The source ran but failed to produce results.
    #[error("source '{source_name}' failed: {message}")]
    Failed {
        source_name: String,
        message: String,
    },

    /// The source did not answer within the query deadline.
    #[error("source '{source_name}' timed out after {elapsed:?}")]
    Timeout {
        source_name: String,
        elapsed: Duration,
    },

    /// Every source of a multi-source corpus failed.
    #[error("all {count} sources of corpus '{corpus}' failed")]
    CorpusUnavailable { corpus: String, count: usize },
}

impl SourceError {
    pub fn failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        SourceError::Failed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
