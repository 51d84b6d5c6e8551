/*!
 * Process-wide coordination primitives: a named mutex registry and an
 * interval/cron task scheduler, split out from the scan pipeline the way
 * `orbit-sentinel` and `core-resilience` are split from the root `orbit`
 * crate.
 */

mod error;
mod mutex_registry;
mod scheduler;

pub use error::{Result, SchedulerError};
pub use mutex_registry::{global as global_mutex_registry, NamedMutexRegistry};
pub use scheduler::{CancellationSignal, SchedulePlan, ScheduledTask};
