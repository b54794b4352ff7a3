//! The retrying worker: drives one unit through model → validate → store.
//!
//! ## Retry strategy
//!
//! Every failure mode consumes one attempt and is retried after a constant
//! backoff: a transport error, a timeout, an unparseable response, and a
//! parsed-but-invalid candidate are deliberately indistinguishable to the
//! loop. The model endpoints this was tuned against fail in bursts that a
//! 2 s constant delay rides out; the policy is injected so a different
//! shape can be swapped in without touching this module.
//!
//! ## Persistence coupling
//!
//! The worker itself performs the store write — processing and persistence
//! are not decoupled. A crash between model response and store write loses
//! that one unit's result, but the store never holds a partial record.

use crate::config::RetryPolicy;
use crate::error::UnitError;
use crate::types::WorkUnit;
use async_trait::async_trait;
use std::fmt;
use tokio::time::sleep;
use tracing::warn;

/// Result of one model round-trip, after parsing.
pub enum Attempt<R> {
    /// Parsed and passed the validation contract.
    Valid(R),
    /// Parsed, but rejected by the validation contract. The candidate is
    /// kept so the stage can salvage it after exhaustion.
    Rejected { candidate: R, reason: String },
}

/// One enrichment stage: how to attempt a unit, commit its record, and
/// (optionally) salvage a rejected candidate.
///
/// The retry loop in [`process_unit`] is the only caller; stages never
/// retry internally.
#[async_trait]
pub trait Stage: Send + Sync {
    type Key: fmt::Display + Clone + Send + Sync + 'static;
    type Payload: Send + Sync + 'static;
    type Record: Send + Sync + 'static;

    /// Short stage name for log lines.
    fn name(&self) -> &'static str;

    /// One model round-trip: build the request from the unit's payload,
    /// call the model, parse, validate. `Err` is a transient failure;
    /// `Ok(Rejected { .. })` is a response that parsed but failed the
    /// contract.
    async fn attempt(
        &self,
        unit: &WorkUnit<Self::Key, Self::Payload>,
    ) -> Result<Attempt<Self::Record>, UnitError>;

    /// Persist a validated record. Must be retryable: committing the same
    /// record twice is last-write-wins, not an error.
    async fn commit(&self, key: &Self::Key, record: &Self::Record) -> Result<(), UnitError>;

    /// Called once after exhaustion with the last rejected candidate, if
    /// any. Returns whether a best-effort record was actually kept.
    /// Default: discard (the unit stays pending for the next run).
    async fn salvage(&self, _key: &Self::Key, _candidate: Self::Record) -> bool {
        false
    }
}

/// Terminal state of one unit after the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A validated record was written to the store.
    Committed,
    /// Attempts exhausted, but the stage kept a flagged best-effort record.
    Salvaged,
    /// Attempts exhausted with nothing written.
    Exhausted,
    /// A valid record was produced but the store rejected it twice; the
    /// unit stays pending.
    StoreFailed,
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed)
    }
}

/// Drive one unit to a terminal [`Outcome`].
///
/// Up to `policy.max_attempts` attempts, sleeping `policy.backoff` between
/// them. The first valid result commits immediately; no further attempts
/// follow a success.
pub async fn process_unit<S: Stage>(
    stage: &S,
    unit: &WorkUnit<S::Key, S::Payload>,
    policy: &RetryPolicy,
) -> Outcome {
    let mut last_rejected: Option<S::Record> = None;

    for attempt_no in 1..=policy.max_attempts {
        if attempt_no > 1 {
            sleep(policy.backoff).await;
        }

        match stage.attempt(unit).await {
            Ok(Attempt::Valid(record)) => {
                return commit_with_retry(stage, &unit.key, &record, policy).await;
            }
            Ok(Attempt::Rejected { candidate, reason }) => {
                warn!(
                    "{} {}: attempt {}/{} rejected — {}",
                    stage.name(),
                    unit.key,
                    attempt_no,
                    policy.max_attempts,
                    reason
                );
                last_rejected = Some(candidate);
            }
            Err(e) => {
                warn!(
                    "{} {}: attempt {}/{} failed — {}",
                    stage.name(),
                    unit.key,
                    attempt_no,
                    policy.max_attempts,
                    e
                );
            }
        }
    }

    if let Some(candidate) = last_rejected {
        if stage.salvage(&unit.key, candidate).await {
            warn!(
                "{} {}: exhausted after {} attempts, kept flagged best-effort record",
                stage.name(),
                unit.key,
                policy.max_attempts
            );
            return Outcome::Salvaged;
        }
    }
    warn!(
        "{} {}: exhausted after {} attempts, nothing committed",
        stage.name(),
        unit.key,
        policy.max_attempts
    );
    Outcome::Exhausted
}

/// Commit with one immediate retry after a fixed delay.
///
/// A second failure leaves the unit pending rather than aborting the run;
/// the next invocation will pick it up again.
async fn commit_with_retry<S: Stage>(
    stage: &S,
    key: &S::Key,
    record: &S::Record,
    policy: &RetryPolicy,
) -> Outcome {
    match stage.commit(key, record).await {
        Ok(()) => Outcome::Committed,
        Err(first) => {
            warn!(
                "{} {}: store write failed ({first}), retrying once",
                stage.name(),
                key
            );
            sleep(policy.backoff).await;
            match stage.commit(key, record).await {
                Ok(()) => Outcome::Committed,
                Err(second) => {
                    warn!(
                        "{} {}: store write failed again ({second}), leaving unit pending",
                        stage.name(),
                        key
                    );
                    Outcome::StoreFailed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scriptable stage: each element of `script` is consumed by one
    /// attempt; commits can be made to fail a number of times.
    struct ScriptedStage {
        script: Mutex<Vec<Result<Attempt<String>, UnitError>>>,
        attempts: AtomicUsize,
        commit_failures: AtomicUsize,
        committed: Mutex<Vec<(String, String)>>,
        salvaged: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedStage {
        fn new(script: Vec<Result<Attempt<String>, UnitError>>) -> Self {
            Self {
                script: Mutex::new(script),
                attempts: AtomicUsize::new(0),
                commit_failures: AtomicUsize::new(0),
                committed: Mutex::new(Vec::new()),
                salvaged: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Stage for ScriptedStage {
        type Key = String;
        type Payload = ();
        type Record = String;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn attempt(
            &self,
            _unit: &WorkUnit<String, ()>,
        ) -> Result<Attempt<String>, UnitError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(UnitError::Model("script exhausted".into()));
            }
            script.remove(0)
        }

        async fn commit(&self, key: &String, record: &String) -> Result<(), UnitError> {
            if self.commit_failures.load(Ordering::SeqCst) > 0 {
                self.commit_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(UnitError::Store("injected".into()));
            }
            self.committed
                .lock()
                .unwrap()
                .push((key.clone(), record.clone()));
            Ok(())
        }

        async fn salvage(&self, key: &String, candidate: String) -> bool {
            self.salvaged.lock().unwrap().push((key.clone(), candidate));
            true
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
            unit_pause: Duration::ZERO,
        }
    }

    fn unit() -> WorkUnit<String, ()> {
        WorkUnit::new("2019/3".to_string(), ())
    }

    #[tokio::test]
    async fn first_valid_result_commits_immediately() {
        let stage = ScriptedStage::new(vec![
            Err(UnitError::Model("blip".into())),
            Ok(Attempt::Valid("record".into())),
        ]);
        let outcome = process_unit(&stage, &unit(), &fast_policy(5)).await;
        assert_eq!(outcome, Outcome::Committed);
        // Two attempts consumed, not five.
        assert_eq!(stage.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(stage.committed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhaustion_makes_exactly_max_attempts_calls() {
        let stage = ScriptedStage::new(vec![]);
        let outcome = process_unit(&stage, &unit(), &fast_policy(5)).await;
        assert_eq!(outcome, Outcome::Exhausted);
        assert_eq!(stage.attempts.load(Ordering::SeqCst), 5);
        assert!(stage.committed.lock().unwrap().is_empty());
        assert!(stage.salvaged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_candidates_are_salvaged_after_exhaustion() {
        let stage = ScriptedStage::new(vec![
            Ok(Attempt::Rejected {
                candidate: "first".into(),
                reason: "too short".into(),
            }),
            Err(UnitError::Model("blip".into())),
            Ok(Attempt::Rejected {
                candidate: "last".into(),
                reason: "too short".into(),
            }),
        ]);
        let outcome = process_unit(&stage, &unit(), &fast_policy(3)).await;
        assert_eq!(outcome, Outcome::Salvaged);
        // The most recent rejected candidate wins.
        let salvaged = stage.salvaged.lock().unwrap();
        assert_eq!(salvaged.as_slice(), &[("2019/3".into(), "last".into())]);
        assert!(stage.committed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_retries_once_then_succeeds() {
        let stage = ScriptedStage::new(vec![Ok(Attempt::Valid("record".into()))]);
        stage.commit_failures.store(1, Ordering::SeqCst);
        let outcome = process_unit(&stage, &unit(), &fast_policy(3)).await;
        assert_eq!(outcome, Outcome::Committed);
        assert_eq!(stage.committed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn double_commit_failure_leaves_unit_pending() {
        let stage = ScriptedStage::new(vec![Ok(Attempt::Valid("record".into()))]);
        stage.commit_failures.store(2, Ordering::SeqCst);
        let outcome = process_unit(&stage, &unit(), &fast_policy(3)).await;
        assert_eq!(outcome, Outcome::StoreFailed);
        assert!(stage.committed.lock().unwrap().is_empty());
        // The model is not re-queried for a store failure.
        assert_eq!(stage.attempts.load(Ordering::SeqCst), 1);
    }
}
