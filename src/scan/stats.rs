/*!
 * Scan-wide counters and the per-path error bag, shared across walker
 * workers via `Arc`.
 */

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::ScanError;

/// Concurrent counters updated by every walker worker.
#[derive(Default)]
pub struct ScanStatistics {
    pub files_seen: AtomicU64,
    pub files_emitted: AtomicU64,
    pub files_ignored: AtomicU64,
    pub directories_visited: AtomicU64,
    pub symlinks_skipped: AtomicU64,
    pub bytes_seen: AtomicU64,
}

impl ScanStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ScanStatisticsSnapshot {
        ScanStatisticsSnapshot {
            files_seen: self.files_seen.load(Ordering::Relaxed),
            files_emitted: self.files_emitted.load(Ordering::Relaxed),
            files_ignored: self.files_ignored.load(Ordering::Relaxed),
            directories_visited: self.directories_visited.load(Ordering::Relaxed),
            symlinks_skipped: self.symlinks_skipped.load(Ordering::Relaxed),
            bytes_seen: self.bytes_seen.load(Ordering::Relaxed),
        }
    }
}

/// An immutable point-in-time read of [`ScanStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatisticsSnapshot {
    pub files_seen: u64,
    pub files_emitted: u64,
    pub files_ignored: u64,
    pub directories_visited: u64,
    pub symlinks_skipped: u64,
    pub bytes_seen: u64,
}

/// A path a walker worker failed to process, and why.
pub struct ScanPathError {
    pub path: PathBuf,
    pub error: ScanError,
}

/// A thread-safe append-only bag of per-path scan errors.
///
/// Access-denied on one directory never stops the rest of the scan; its
/// error is recorded here instead of aborting the walk.
#[derive(Default)]
pub struct ScanErrorBag {
    errors: Mutex<Vec<ScanPathError>>,
}

impl ScanErrorBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: PathBuf, error: ScanError) {
        self.errors.lock().unwrap().push(ScanPathError { path, error });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub fn into_vec(self) -> Vec<ScanPathError> {
        self.errors.into_inner().unwrap()
    }
}
