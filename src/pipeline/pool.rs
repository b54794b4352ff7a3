//! The worker pool: shard the backlog, fan out, sum the tallies.
//!
//! The backlog is split into contiguous, near-equal shards, one spawned
//! task per shard, each draining its shard strictly in order. There is no
//! work-stealing: per-unit cost is dominated by model-call latency, which
//! is roughly uniform, so a slow shard costs little and the scheduling
//! stays trivially predictable. Workers share nothing mutable except the
//! store behind the stage, and a unit's failure never aborts its siblings.

use crate::config::RetryPolicy;
use crate::pipeline::progress::ProgressHook;
use crate::pipeline::worker::{process_unit, Outcome, Stage};
use crate::types::{Tally, WorkUnit};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info};

/// Split `backlog` into at most `workers` contiguous shards of near-equal
/// size (ceiling division; the final shard may be smaller). Every unit
/// appears in exactly one shard, in its original position.
pub fn shard<T>(backlog: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    if backlog.is_empty() {
        return Vec::new();
    }
    let per_shard = backlog.len().div_ceil(workers);

    let mut shards = Vec::new();
    let mut rest = backlog;
    while !rest.is_empty() {
        let tail = rest.split_off(per_shard.min(rest.len()));
        shards.push(rest);
        rest = tail;
    }
    shards
}

/// Run the backlog to completion across `workers` concurrent workers.
///
/// Returns the summed [`Tally`]; summation is commutative, so the result
/// does not depend on which shard finishes first.
pub async fn run_pool<S: Stage + 'static>(
    stage: Arc<S>,
    backlog: Vec<WorkUnit<S::Key, S::Payload>>,
    workers: usize,
    policy: RetryPolicy,
    hook: Arc<dyn ProgressHook>,
) -> Tally {
    let total = backlog.len();
    if total == 0 {
        info!("{}: backlog empty, nothing to do", stage.name());
        return Tally::default();
    }

    hook.on_run_start(total);
    let shards = shard(backlog, workers);
    info!(
        "{}: {} units across {} workers",
        stage.name(),
        total,
        shards.len()
    );

    let mut handles = Vec::with_capacity(shards.len());
    for (worker_id, units) in shards.into_iter().enumerate() {
        let stage = Arc::clone(&stage);
        let hook = Arc::clone(&hook);
        handles.push(tokio::spawn(async move {
            drain_shard(stage, units, worker_id, policy, hook).await
        }));
    }

    let mut tally = Tally::default();
    for handle in handles {
        // A worker task never panics in normal operation; if one does,
        // count its whole shard as not committed rather than poisoning
        // the run.
        if let Ok(shard_tally) = handle.await {
            tally.merge(shard_tally);
        }
    }

    hook.on_run_complete(total, tally.committed);
    info!(
        "{}: run complete — {}/{} committed, {} salvaged, {} failed",
        stage.name(),
        tally.committed,
        total,
        tally.salvaged,
        tally.failed
    );
    tally
}

/// Sequentially drain one shard, pausing briefly between units to bound
/// the request rate.
async fn drain_shard<S: Stage>(
    stage: Arc<S>,
    units: Vec<WorkUnit<S::Key, S::Payload>>,
    worker_id: usize,
    policy: RetryPolicy,
    hook: Arc<dyn ProgressHook>,
) -> Tally {
    debug!(
        "{}: worker {} started with {} units",
        stage.name(),
        worker_id,
        units.len()
    );

    let mut tally = Tally::default();
    for (i, unit) in units.iter().enumerate() {
        if i > 0 && !policy.unit_pause.is_zero() {
            sleep(policy.unit_pause).await;
        }

        let key = unit.key.to_string();
        hook.on_unit_start(&key);
        match process_unit(stage.as_ref(), unit, &policy).await {
            Outcome::Committed => {
                tally.committed += 1;
                hook.on_unit_committed(&key);
            }
            Outcome::Salvaged => {
                tally.salvaged += 1;
                hook.on_unit_failed(&key, "attempts exhausted (best-effort record kept)");
            }
            Outcome::Exhausted => {
                tally.failed += 1;
                hook.on_unit_failed(&key, "attempts exhausted");
            }
            Outcome::StoreFailed => {
                tally.failed += 1;
                hook.on_unit_failed(&key, "store write failed");
            }
        }
    }

    debug!(
        "{}: worker {} done — {}/{} committed",
        stage.name(),
        worker_id,
        tally.committed,
        units.len()
    );
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnitError;
    use crate::pipeline::progress::NoopHook;
    use crate::pipeline::worker::Attempt;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn shards_partition_exactly() {
        for n in [0usize, 1, 5, 10, 11, 97] {
            for w in [1usize, 2, 3, 10, 20] {
                let backlog: Vec<usize> = (0..n).collect();
                let shards = shard(backlog, w);

                assert!(shards.len() <= w, "n={n} w={w}");
                let flat: Vec<usize> = shards.iter().flatten().copied().collect();
                // No unit duplicated or dropped, order preserved.
                assert_eq!(flat, (0..n).collect::<Vec<_>>(), "n={n} w={w}");

                // Near-equal: shard sizes differ by at most per-shard slack.
                if let Some(max) = shards.iter().map(|s| s.len()).max() {
                    assert_eq!(max, n.div_ceil(w.max(1)).min(n), "n={n} w={w}");
                }
            }
        }
    }

    #[test]
    fn empty_backlog_yields_no_shards() {
        assert!(shard(Vec::<u8>::new(), 4).is_empty());
    }

    struct AlwaysValid {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Stage for AlwaysValid {
        type Key = String;
        type Payload = u32;
        type Record = u32;

        fn name(&self) -> &'static str {
            "always-valid"
        }

        async fn attempt(
            &self,
            unit: &WorkUnit<String, u32>,
        ) -> Result<Attempt<u32>, UnitError> {
            Ok(Attempt::Valid(unit.payload * 2))
        }

        async fn commit(&self, key: &String, _record: &u32) -> Result<(), UnitError> {
            self.seen.lock().unwrap().push(key.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn pool_commits_every_unit_exactly_once() {
        let stage = Arc::new(AlwaysValid {
            seen: Mutex::new(Vec::new()),
        });
        let backlog: Vec<WorkUnit<String, u32>> = (0..23)
            .map(|i| WorkUnit::new(format!("k{i}"), i))
            .collect();
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
            unit_pause: Duration::ZERO,
        };

        let tally = run_pool(Arc::clone(&stage), backlog, 4, policy, Arc::new(NoopHook)).await;
        assert_eq!(tally.committed, 23);
        assert_eq!(tally.total(), 23);

        let seen = stage.seen.lock().unwrap();
        let unique: HashSet<&String> = seen.iter().collect();
        assert_eq!(unique.len(), 23, "no key committed twice");
    }

    #[tokio::test]
    async fn tally_never_exceeds_backlog_size() {
        let stage = Arc::new(AlwaysValid {
            seen: Mutex::new(Vec::new()),
        });
        let backlog: Vec<WorkUnit<String, u32>> =
            (0..7).map(|i| WorkUnit::new(format!("k{i}"), i)).collect();
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff: Duration::ZERO,
            unit_pause: Duration::ZERO,
        };
        // More workers than units: shards collapse to one unit each.
        let tally = run_pool(stage, backlog, 20, policy, Arc::new(NoopHook)).await;
        assert_eq!(tally.committed, 7);
    }
}
