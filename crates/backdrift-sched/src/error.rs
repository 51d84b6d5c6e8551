/*!
 * Error types for the scheduling and named-mutex crate.
 */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("task has been disposed")]
    Disposed,

    #[error("timed out waiting {0:?} for mutex {1:?}")]
    MutexTimeout(std::time::Duration, String),
}
