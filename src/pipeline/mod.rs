//! The resumable enrichment core shared by every stage.
//!
//! * [`worker`] — retry loop driving one unit through model → validate → store
//! * [`pool`] — backlog sharding and concurrent fan-out
//! * [`resume`] — startup scan flagging suspect records for reprocessing
//! * [`progress`] — optional per-unit event hook

pub mod pool;
pub mod progress;
pub mod resume;
pub mod worker;

pub use pool::{run_pool, shard};
pub use progress::{NoopHook, ProgressHook};
pub use resume::{scan, ResumeScan};
pub use worker::{process_unit, Attempt, Outcome, Stage};
