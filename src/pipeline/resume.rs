//! Startup scan of the results document: what exists, what looks wrong.
//!
//! The heuristic here is deliberately independent of — and stricter than —
//! the commit-time validator: the validator tolerates one short option per
//! question, the scanner flags any short option. A record that squeaked
//! past validation in an earlier run (or predates the current rules) still
//! gets a second look, at the cost of occasionally re-extracting a page
//! that was fine.

use crate::store::file::FileStore;
use crate::types::{PageKey, QuestionEntry};
use crate::validate::MIN_TEXT_LEN;
use std::collections::HashSet;
use tracing::info;

/// What the scanner found in the store.
#[derive(Debug, Default)]
pub struct ResumeScan {
    /// Keys whose stored record looks incomplete; re-queued ahead of new
    /// work, in sorted order.
    pub flagged: Vec<PageKey>,
    /// Every key present in the store, flagged or not. Used to exclude
    /// already-done pages when assembling the new-work backlog.
    pub existing: HashSet<PageKey>,
}

impl ResumeScan {
    /// True when `key` is present and not flagged — i.e. safe to skip.
    pub fn is_done(&self, key: &PageKey) -> bool {
        self.existing.contains(key) && !self.flagged.contains(key)
    }
}

/// Scan the full store contents and flag suspicious records.
pub async fn scan(store: &FileStore) -> ResumeScan {
    let snapshot = store.snapshot().await;
    let mut scan = ResumeScan::default();

    for (year, pages) in &snapshot {
        for (page, entries) in &pages.pages {
            let key = PageKey::new(year.clone(), page.clone());
            let verify = pages.needs_verification.contains(page);
            if verify || looks_suspect(entries) {
                info!(
                    "flagging {key} for reprocessing ({})",
                    if verify {
                        "needs verification"
                    } else {
                        "suspicious content"
                    }
                );
                scan.flagged.push(key.clone());
            }
            scan.existing.insert(key);
        }
        // A verification marker can exist without entries (the page was
        // salvaged with an empty candidate in some historic runs).
        for page in &pages.needs_verification {
            let key = PageKey::new(year.clone(), page.clone());
            if scan.existing.insert(key.clone()) {
                info!("flagging {key} for reprocessing (needs verification, no entries)");
                scan.flagged.push(key);
            }
        }
    }

    scan.flagged.sort();
    scan.flagged.dedup();
    scan
}

/// Cheap incompleteness heuristic for a stored page record.
fn looks_suspect(entries: &[QuestionEntry]) -> bool {
    if entries.is_empty() {
        return true;
    }
    entries.iter().any(|q| {
        q.question_text.chars().count() < MIN_TEXT_LEN
            || q.options
                .iter()
                .any(|opt| !opt.is_empty() && opt.chars().count() < MIN_TEXT_LEN)
    })
}
