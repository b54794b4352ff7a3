//! Pipeline configuration.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across worker tasks and to diff two runs when
//! their outcomes differ.
//!
//! The retry knobs are deliberately surfaced as an explicit
//! [`RetryPolicy`] value handed to the worker, rather than read ad hoc
//! inside the retry loop. Swapping constant backoff for something smarter
//! then touches this module only, never the worker logic.

use crate::error::ExamscribeError;
use std::time::Duration;

/// Configuration for one pipeline run (any stage).
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use examscribe::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .workers(20)
///     .backoff_ms(2_000)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of concurrent workers the backlog is sharded across. Default: 10.
    ///
    /// Per-unit cost is dominated by model-call latency, which is roughly
    /// uniform, so contiguous sharding without work-stealing stays close to
    /// balanced. Raise this if the API tolerates it; lower it when the
    /// endpoint rate-limits.
    pub workers: usize,

    /// Attempts per page for the extraction stage. Default: 3.
    ///
    /// A vision call is the expensive one; three attempts catch transient
    /// failures without burning budget on a page the model genuinely cannot
    /// read (those are salvaged as flagged records instead).
    pub extract_attempts: u32,

    /// Attempts per row for the classification stages. Default: 5.
    ///
    /// Text calls are cheap and label validation is strict, so extra
    /// attempts buy real completions here.
    pub classify_attempts: u32,

    /// Constant delay between failed attempts, in milliseconds. Default: 2000.
    pub backoff_ms: u64,

    /// Pause between consecutive units in one shard, in milliseconds.
    /// Default: 300. Bounds the request rate against the model API and the
    /// shared store.
    pub unit_pause_ms: u64,

    /// Per-model-call timeout in seconds. Default: 60. A timed-out call is
    /// treated as a failed attempt, never assumed to have succeeded.
    pub api_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            extract_attempts: 3,
            classify_attempts: 5,
            backoff_ms: 2_000,
            unit_pause_ms: 300,
            api_timeout_secs: 60,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry policy for the extraction stage.
    pub fn extract_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.extract_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
            unit_pause: Duration::from_millis(self.unit_pause_ms),
        }
    }

    /// Retry policy for the subject/topic classification stages.
    pub fn classify_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.classify_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
            unit_pause: Duration::from_millis(self.unit_pause_ms),
        }
    }

    /// Per-call timeout as a [`Duration`].
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn extract_attempts(mut self, n: u32) -> Self {
        self.config.extract_attempts = n.max(1);
        self
    }

    pub fn classify_attempts(mut self, n: u32) -> Self {
        self.config.classify_attempts = n.max(1);
        self
    }

    pub fn backoff_ms(mut self, ms: u64) -> Self {
        self.config.backoff_ms = ms;
        self
    }

    pub fn unit_pause_ms(mut self, ms: u64) -> Self {
        self.config.unit_pause_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ExamscribeError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(ExamscribeError::InvalidConfig(
                "workers must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExamscribeError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Attempt budget and delays driving one worker's retry loop.
///
/// Constant backoff, matching the behaviour the store and model endpoints
/// were tuned against. The worker only sees this value, so an exponential
/// policy can replace it without touching worker logic.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts per unit (model call + validate).
    pub max_attempts: u32,
    /// Sleep between failed attempts, and before the single commit retry.
    pub backoff: Duration,
    /// Sleep between consecutive units in the same shard.
    pub unit_pause: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.workers, 10);
        assert_eq!(c.extract_attempts, 3);
        assert_eq!(c.classify_attempts, 5);
        assert_eq!(c.backoff_ms, 2_000);
        assert_eq!(c.unit_pause_ms, 300);
    }

    #[test]
    fn builder_clamps_workers_to_one() {
        let c = PipelineConfig::builder().workers(0).build().unwrap();
        assert_eq!(c.workers, 1);
    }

    #[test]
    fn policies_carry_the_stage_budgets() {
        let c = PipelineConfig::default();
        assert_eq!(c.extract_policy().max_attempts, 3);
        assert_eq!(c.classify_policy().max_attempts, 5);
        assert_eq!(c.classify_policy().backoff, Duration::from_millis(2_000));
    }
}
