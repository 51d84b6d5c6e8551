/*!
 * Backdrift: content-defined chunking and parallel directory scanning for
 * backup/sync pipelines.
 *
 * The pipeline a host wires together:
 * - [`backdrift_sched::ScheduledTask`] triggers a scan.
 * - [`scan::walk`] consumes a root path and, via [`scan::IgnoreRuleSet`],
 *   emits accepted file paths.
 * - For each file, the host calls either [`backdrift_cdc::Chunker`] or
 *   [`sampling::sampling_digest`]; both ultimately hash bytes through
 *   [`backdrift_cdc::content_digest`].
 * - [`backdrift_sched::NamedMutexRegistry`] guards any critical section the
 *   host designates, such as per-root mutual exclusion across schedules.
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod sampling;
pub mod scan;

pub use backdrift_cdc::{
    content_digest, to_hex, CancellationToken, ChunkInfo, ChunkOutcome, Chunker, ChunkerConfig,
    HashKind,
};
pub use backdrift_sched::{
    global_mutex_registry, CancellationSignal, NamedMutexRegistry, SchedulePlan, ScheduledTask,
};

pub use config::{ScanOptions, ScanTarget, SchedulerPolicy};
pub use error::{BackdriftError, Result, ScanError};
pub use sampling::{sampling_digest, SamplingConfig};
pub use scan::{walk, FileEntry, IgnoreRuleSet, WalkOutcome};
