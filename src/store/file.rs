//! JSON-document store for extraction results.
//!
//! The whole document is loaded at open, mutated in memory, and rewritten
//! to disk (temp file + rename) after every successful page. That makes
//! resumption trivial and every commit atomic at the file level.
//!
//! **Single-writer constraint**: this store is safe for one process with
//! many tasks — the in-memory document sits behind an async mutex that is
//! held across each persist, so writes serialise. It is NOT safe for two
//! processes sharing one file: each would hold an independent in-memory
//! copy and the last to persist wins wholesale. Use the relational backend
//! when more than one process must write.
//!
//! ## Document shape
//!
//! ```json
//! {
//!   "2019": {
//!     "1": [ { "question_number": 1, "question_text": "…", … } ],
//!     "2": [ … ],
//!     "3_needs_verification": true,
//!     "3": [ … ]
//!   }
//! }
//! ```
//!
//! A `"<page>_needs_verification": true` marker flags a best-effort record
//! written after retry exhaustion; the resume scanner re-queues such pages.

use crate::error::{ExamscribeError, UnitError};
use crate::types::{PageKey, QuestionEntry};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const VERIFY_SUFFIX: &str = "_needs_verification";

/// All pages stored for one year.
#[derive(Debug, Clone, Default)]
pub struct YearPages {
    /// Page number (leading zeros stripped) → extracted questions.
    pub pages: BTreeMap<String, Vec<QuestionEntry>>,
    /// Pages whose stored record is a flagged best-effort result.
    pub needs_verification: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Inner {
    years: BTreeMap<String, YearPages>,
}

/// File-backed store: `year → page → [QuestionEntry]`, persisted wholesale.
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileStore {
    /// Open (or create) the store at `path`.
    ///
    /// A missing file starts an empty store. A corrupt file is logged and
    /// replaced by an empty store rather than aborting the run — the next
    /// persist overwrites it, and every page simply counts as pending.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ExamscribeError> {
        let path = path.into();
        let inner = match tokio::fs::read(&path).await {
            Ok(bytes) => match parse_document(&bytes) {
                Ok(inner) => {
                    info!(
                        "resuming from existing results file: {} ({} years)",
                        path.display(),
                        inner.years.len()
                    );
                    inner
                }
                Err(e) => {
                    warn!(
                        "results file '{}' is corrupt ({e}); starting fresh",
                        path.display()
                    );
                    Inner::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Inner::default(),
            Err(source) => return Err(ExamscribeError::StoreRead { path, source }),
        };

        Ok(Self {
            path,
            inner: Mutex::new(inner),
        })
    }

    /// True when any record (flagged or not) exists for `key`.
    pub async fn contains(&self, key: &PageKey) -> bool {
        let inner = self.inner.lock().await;
        inner
            .years
            .get(&key.year)
            .is_some_and(|y| y.pages.contains_key(&key.page))
    }

    /// The stored record for `key`, if any.
    pub async fn get(&self, key: &PageKey) -> Option<Vec<QuestionEntry>> {
        let inner = self.inner.lock().await;
        inner
            .years
            .get(&key.year)
            .and_then(|y| y.pages.get(&key.page))
            .cloned()
    }

    /// True when `key` carries the needs-verification marker.
    pub async fn is_flagged(&self, key: &PageKey) -> bool {
        let inner = self.inner.lock().await;
        inner
            .years
            .get(&key.year)
            .is_some_and(|y| y.needs_verification.contains(&key.page))
    }

    /// Commit a validated record for `key` and persist the document.
    ///
    /// Last-write-wins: a re-run overwrites the prior record and clears any
    /// verification marker. Safely retryable.
    pub async fn insert(
        &self,
        key: &PageKey,
        entries: Vec<QuestionEntry>,
    ) -> Result<(), UnitError> {
        let mut inner = self.inner.lock().await;
        let year = inner.years.entry(key.year.clone()).or_default();
        year.pages.insert(key.page.clone(), entries);
        year.needs_verification.remove(&key.page);
        self.persist(&inner).await
    }

    /// Store a best-effort record flagged for verification.
    ///
    /// Written after retry exhaustion when the last response parsed but
    /// failed validation; the resume scanner will re-queue this key.
    pub async fn mark_needs_verification(
        &self,
        key: &PageKey,
        entries: Vec<QuestionEntry>,
    ) -> Result<(), UnitError> {
        let mut inner = self.inner.lock().await;
        let year = inner.years.entry(key.year.clone()).or_default();
        year.pages.insert(key.page.clone(), entries);
        year.needs_verification.insert(key.page.clone());
        self.persist(&inner).await
    }

    /// A full clone of the document, for scanning and import.
    pub async fn snapshot(&self) -> BTreeMap<String, YearPages> {
        self.inner.lock().await.years.clone()
    }

    /// Serialise and atomically rewrite the backing file.
    ///
    /// Called with the document lock held so concurrent commits cannot
    /// interleave their renames and resurrect an older snapshot.
    async fn persist(&self, inner: &Inner) -> Result<(), UnitError> {
        let doc = render_document(inner);
        let json = serde_json::to_string_pretty(&doc)
            .map_err(|e| UnitError::Store(format!("serialize results: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| UnitError::Store(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| UnitError::Store(format!("rename to {}: {e}", self.path.display())))?;

        debug!("results file updated: {}", self.path.display());
        Ok(())
    }
}

fn parse_document(bytes: &[u8]) -> Result<Inner, serde_json::Error> {
    let doc: BTreeMap<String, Map<String, Value>> = serde_json::from_slice(bytes)?;
    let mut inner = Inner::default();

    for (year, pages) in doc {
        let mut year_pages = YearPages::default();
        for (page_key, value) in pages {
            if let Some(page) = page_key.strip_suffix(VERIFY_SUFFIX) {
                if value.as_bool() == Some(true) {
                    year_pages.needs_verification.insert(page.to_string());
                }
            } else {
                let entries: Vec<QuestionEntry> = serde_json::from_value(value)?;
                year_pages.pages.insert(page_key, entries);
            }
        }
        inner.years.insert(year, year_pages);
    }

    Ok(inner)
}

fn render_document(inner: &Inner) -> BTreeMap<String, Map<String, Value>> {
    let mut doc = BTreeMap::new();
    for (year, year_pages) in &inner.years {
        let mut pages = Map::new();
        for (page, entries) in &year_pages.pages {
            // QuestionEntry serialisation is infallible: all fields are
            // plain data.
            pages.insert(
                page.clone(),
                serde_json::to_value(entries).unwrap_or(Value::Null),
            );
        }
        for page in &year_pages.needs_verification {
            pages.insert(format!("{page}{VERIFY_SUFFIX}"), Value::Bool(true));
        }
        doc.insert(year.clone(), pages);
    }
    doc
}
