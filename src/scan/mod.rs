/*!
 * Directory scanning: ignore rules (C7) and the parallel walker (C8),
 * composed behind a single entry point.
 */

mod ignore;
mod stats;
mod walker;

pub use ignore::IgnoreRuleSet;
pub use stats::{ScanErrorBag, ScanPathError, ScanStatistics, ScanStatisticsSnapshot};
pub use walker::{walk, FileEntry, WalkOutcome};
