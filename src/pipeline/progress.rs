//! Progress-hook trait for per-unit pipeline events.
//!
//! Inject an `Arc<dyn ProgressHook>` into [`crate::pipeline::run_pool`] to
//! receive events as workers drain their shards. Callbacks are the
//! least-invasive integration point: the CLI forwards them to a terminal
//! progress bar, tests count them, and the library stays ignorant of how
//! the host application reports progress.

/// Called by the pool as units are processed.
///
/// Implementations must be `Send + Sync`: with more than one worker the
/// per-unit methods are invoked concurrently from different tasks. All
/// methods default to no-ops so callers only override what they need.
pub trait ProgressHook: Send + Sync {
    /// Called once before any unit is dispatched.
    fn on_run_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before a unit's first attempt.
    fn on_unit_start(&self, key: &str) {
        let _ = key;
    }

    /// Called when a unit's validated record has been committed.
    fn on_unit_committed(&self, key: &str) {
        let _ = key;
    }

    /// Called when a unit ends without a committed record.
    fn on_unit_failed(&self, key: &str, detail: &str) {
        let _ = (key, detail);
    }

    /// Called once after every shard has drained.
    fn on_run_complete(&self, total_units: usize, committed: usize) {
        let _ = (total_units, committed);
    }
}

/// No-op hook for callers that don't report progress.
pub struct NoopHook;

impl ProgressHook for NoopHook {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        committed: AtomicUsize,
        failed: AtomicUsize,
    }

    impl ProgressHook for Counting {
        fn on_unit_committed(&self, _key: &str) {
            self.committed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_unit_failed(&self, _key: &str, _detail: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn default_methods_are_noops() {
        let hook = NoopHook;
        hook.on_run_start(3);
        hook.on_unit_start("2019/1");
        hook.on_unit_committed("2019/1");
        hook.on_unit_failed("2019/2", "exhausted");
        hook.on_run_complete(3, 1);
    }

    #[test]
    fn hooks_work_behind_arc_dyn() {
        let hook: Arc<dyn ProgressHook> = Arc::new(Counting {
            committed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        });
        hook.on_unit_committed("a");
        hook.on_unit_committed("b");
        hook.on_unit_failed("c", "store write failed");
    }
}
