//! Error types for the examscribe library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExamscribeError`] — **Fatal**: a run cannot start or continue at all
//!   (missing image root, unreadable store, broken database). Returned as
//!   `Err(ExamscribeError)` from the top-level `run_*` functions.
//!
//! * [`UnitError`] — **Non-fatal**: one work unit's attempt failed (model
//!   error, timeout, unparseable response, store write). Consumed inside the
//!   retry loop and never propagated past the worker pool, so a single bad
//!   unit cannot abort its siblings.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the examscribe library.
///
/// Per-unit failures use [`UnitError`] and stay inside the retry loop.
#[derive(Debug, Error)]
pub enum ExamscribeError {
    /// The image root directory does not exist or is not a directory.
    #[error("image root not found: '{path}'")]
    RootNotFound { path: PathBuf },

    /// A requested year directory is missing under the image root.
    #[error("year directory '{year}' not found under '{root}'")]
    YearNotFound { year: String, root: PathBuf },

    /// The results document could not be read.
    #[error("failed to read store file '{path}': {source}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Relational store error (open, migrate, query).
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem error outside the store paths above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A non-fatal failure for a single work unit's attempt.
///
/// Every variant consumes one retry attempt; the worker treats them all
/// identically (log, back off, try again). The split exists for log
/// readability, not for differentiated handling.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The model API call failed (network, HTTP error, empty response).
    #[error("model call failed: {0}")]
    Model(String),

    /// The model call exceeded the request-level timeout.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response arrived but could not be parsed against the contract
    /// (bad JSON, missing delimited label). Handled identically to a model
    /// failure so a schema-violating response follows the same retry path.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// Reading the unit's payload (page image) from disk failed.
    #[error("payload read failed: {0}")]
    Payload(String),

    /// The store rejected the commit.
    #[error("store write failed: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_names_the_budget() {
        let e = UnitError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn year_not_found_display() {
        let e = ExamscribeError::YearNotFound {
            year: "2019".into(),
            root: PathBuf::from("/data/pages"),
        };
        let msg = e.to_string();
        assert!(msg.contains("2019"), "got: {msg}");
        assert!(msg.contains("/data/pages"), "got: {msg}");
    }
}
