/*!
 * Configuration structures for the scan pipeline and its scheduling.
 *
 * Shaped like `orbit::config::CopyConfig`: plain `serde` structs with
 * `Default` impls and a validating constructor, never read from a file or
 * CLI by this crate itself - that remains the host's responsibility.
 */

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BackdriftError, Result};

/// Options controlling a single directory scan (C7/C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Ignore-rule patterns, evaluated last-match-wins in declaration order.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// 0 means unlimited recursion depth.
    #[serde(default)]
    pub max_depth: u32,
    /// Worker count for the consumer pool. 0 means `2 * available_parallelism`.
    #[serde(default)]
    pub workers: usize,
    /// Capacity of the bounded work-item queue between producer and workers.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Whether to follow symlinked directories (loop-guarded regardless).
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Skip files smaller than this, in bytes, if set.
    #[serde(default)]
    pub min_size: Option<u64>,
    /// Skip files larger than this, in bytes, if set.
    #[serde(default)]
    pub max_size: Option<u64>,
    /// Skip files modified more than this long ago, if set.
    #[serde(default, with = "duration_secs_opt")]
    pub max_age: Option<Duration>,
}

fn default_queue_capacity() -> usize {
    100_000
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            max_depth: 0,
            workers: 0,
            queue_capacity: default_queue_capacity(),
            follow_symlinks: false,
            min_size: None,
            max_size: None,
            max_age: None,
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(BackdriftError::Config(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(BackdriftError::Config(
                    "min_size must not exceed max_size".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Resolved worker count: `workers` verbatim if set, otherwise
    /// `2 * available_parallelism` capped at 16 - mirrors
    /// `orbit::core::concurrency::detect_optimal_concurrency`.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        (cpus * 2).min(16)
    }
}

/// How a periodic scan should be scheduled and coordinated (C9/C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerPolicy {
    /// Fixed interval in seconds, mutually exclusive with `cron_expression`.
    pub interval_secs: Option<u64>,
    /// Fire the first interval tick immediately rather than waiting one
    /// interval. Ignored for cron policies.
    #[serde(default)]
    pub immediate_first_fire: bool,
    /// Cron expression, mutually exclusive with `interval_secs`.
    pub cron_expression: Option<String>,
    /// Named-mutex key serializing this policy's fires against other
    /// schedules sharing the same key. `None` means no coordination.
    #[serde(default)]
    pub mutex_key: Option<String>,
    /// How long to wait for `mutex_key`'s permit before dropping the fire.
    #[serde(default = "default_mutex_wait")]
    pub mutex_wait: Duration,
}

fn default_mutex_wait() -> Duration {
    Duration::from_secs(5)
}

impl SchedulerPolicy {
    pub fn validate(&self) -> Result<()> {
        match (self.interval_secs, &self.cron_expression) {
            (Some(_), Some(_)) => Err(BackdriftError::Config(
                "specify either interval_secs or cron_expression, not both".to_string(),
            )),
            (None, None) => Err(BackdriftError::Config(
                "one of interval_secs or cron_expression is required".to_string(),
            )),
            (Some(0), None) => Err(BackdriftError::Config(
                "interval_secs must be greater than zero".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn to_plan(&self) -> Result<backdrift_sched::SchedulePlan> {
        self.validate()?;
        if let Some(secs) = self.interval_secs {
            Ok(backdrift_sched::SchedulePlan::interval(
                Duration::from_secs(secs),
                self.immediate_first_fire,
            )?)
        } else {
            let expression = self.cron_expression.as_ref().expect("validated above");
            Ok(backdrift_sched::SchedulePlan::cron(expression.clone())?)
        }
    }
}

/// Where a scan should start and what it should emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTarget {
    pub root: PathBuf,
    #[serde(default)]
    pub options: ScanOptions,
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
