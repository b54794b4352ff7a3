//! The concrete enrichment stages and their run entry points.
//!
//! * [`extract`] — page image → vision model → validated question list →
//!   results document
//! * [`classify`] — question row → text model → validated label → relational
//!   store

pub mod classify;
pub mod extract;

pub use classify::{run_classification, ClassifyStage};
pub use extract::{run_extraction, ExtractStage};

use crate::types::Tally;

/// Summary of one stage run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunReport {
    /// Units dispatched this run (flagged reruns included).
    pub total: usize,
    /// Terminal outcomes, summed across workers.
    pub tally: Tally,
}

impl RunReport {
    /// True when every dispatched unit ended with a committed record.
    pub fn complete(&self) -> bool {
        self.tally.committed == self.total
    }
}
