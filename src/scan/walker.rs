/*!
 * Parallel directory walker: a bounded, self-replicating work queue of
 * directories, drained by a symmetric pool of worker threads that both
 * consume directories and produce the subdirectories they discover.
 *
 * Grounded on `orbit::core::directory`'s producer/consumer split
 * (`crossbeam_channel::bounded`, `walkdir::WalkDir` for per-directory
 * enumeration), generalized from a copy pipeline (source -> dest work
 * items, one producer thread) to a pure enumeration pipeline (root -> sink,
 * symmetric workers) since this walker's workers must themselves enqueue
 * the subdirectories they find rather than defer to `walkdir`'s internal
 * recursion - and extended with depth-limited enqueueing, visited-symlink
 * loop detection, and a per-path error bag, none of which `copy_directory`
 * needed.
 */

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use walkdir::WalkDir;

use backdrift_cdc::CancellationToken;

use crate::config::ScanOptions;
use crate::error::{Result, ScanError};
use crate::scan::ignore::IgnoreRuleSet;
use crate::scan::stats::{ScanErrorBag, ScanPathError, ScanStatistics, ScanStatisticsSnapshot};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A file discovered by the walker and accepted by the ignore rules and
/// size/age filters.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<std::time::SystemTime>,
}

/// Result of a completed (or cancelled) walk.
pub struct WalkOutcome {
    pub stats: ScanStatisticsSnapshot,
    pub errors: Vec<ScanPathError>,
    pub cancelled: bool,
}

struct WorkItem {
    path: PathBuf,
    depth: u32,
}

struct SharedState {
    root: PathBuf,
    ignore: IgnoreRuleSet,
    options: ScanOptions,
    visited_dirs: Mutex<HashSet<PathBuf>>,
    visited_symlinks: Mutex<HashSet<PathBuf>>,
    stats: ScanStatistics,
    errors: ScanErrorBag,
    pending: AtomicI64,
    done: AtomicBool,
    cancel: CancellationToken,
}

/// Walks `root`, emitting every accepted file to `sink`.
///
/// `sink` is called concurrently from multiple worker threads and must be
/// `Sync`. Cancellation stops enqueueing new directories and lets in-flight
/// directories finish their current enumeration before workers exit.
pub fn walk<F>(
    root: &Path,
    ignore: IgnoreRuleSet,
    options: ScanOptions,
    cancel: CancellationToken,
    sink: F,
) -> Result<WalkOutcome>
where
    F: Fn(FileEntry) + Send + Sync + 'static,
{
    if !root.is_dir() {
        return Err(ScanError::RootNotFound(root.to_path_buf()).into());
    }

    let worker_count = options.resolved_workers().max(1);
    let queue_capacity = options.queue_capacity.max(1);

    let state = Arc::new(SharedState {
        root: root.to_path_buf(),
        ignore,
        options,
        visited_dirs: Mutex::new(HashSet::new()),
        visited_symlinks: Mutex::new(HashSet::new()),
        stats: ScanStatistics::new(),
        errors: ScanErrorBag::new(),
        pending: AtomicI64::new(1),
        done: AtomicBool::new(false),
        cancel,
    });

    state.visited_dirs.lock().unwrap().insert(canonical_or(root));

    let (tx, rx) = bounded::<WorkItem>(queue_capacity);
    let sink = Arc::new(sink);

    tx.send(WorkItem { path: root.to_path_buf(), depth: 0 })
        .expect("root send on a fresh channel cannot fail");

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let rx = rx.clone();
            let tx = tx.clone();
            let state = state.clone();
            let sink = sink.clone();
            scope.spawn(move || worker_loop(rx, tx, state, sink));
        }
        drop(tx);
        drop(rx);
    });

    let cancelled = state.cancel.is_cancelled();
    let stats = state.stats.snapshot();
    let state = Arc::try_unwrap(state)
        .unwrap_or_else(|arc| panic!("walker workers leaked a SharedState clone ({} refs)", Arc::strong_count(&arc)));
    Ok(WalkOutcome { stats, errors: state.errors.into_vec(), cancelled })
}

fn worker_loop<F>(
    rx: crossbeam_channel::Receiver<WorkItem>,
    tx: crossbeam_channel::Sender<WorkItem>,
    state: Arc<SharedState>,
    sink: Arc<F>,
) where
    F: Fn(FileEntry) + Send + Sync + 'static,
{
    loop {
        if state.done.load(Ordering::SeqCst) {
            return;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(item) => {
                if !state.cancel.is_cancelled() {
                    process_directory(&item, &tx, &state, &sink);
                }
                if state.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                    state.done.store(true, Ordering::SeqCst);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if state.cancel.is_cancelled() {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn process_directory<F>(
    item: &WorkItem,
    tx: &crossbeam_channel::Sender<WorkItem>,
    state: &Arc<SharedState>,
    sink: &Arc<F>,
) where
    F: Fn(FileEntry) + Send + Sync + 'static,
{
    state.stats.directories_visited.fetch_add(1, Ordering::Relaxed);

    let entries = match WalkDir::new(&item.path).min_depth(1).max_depth(1).into_iter().collect::<std::result::Result<Vec<_>, _>>() {
        Ok(entries) => entries,
        Err(e) => {
            let io_err = e
                .io_error()
                .map(|io| std::io::Error::new(io.kind(), io.to_string()))
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
            let scan_err = if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                ScanError::AccessDenied { path: item.path.clone() }
            } else {
                ScanError::ReadDir { path: item.path.clone(), source: io_err }
            };
            state.errors.push(item.path.clone(), scan_err);
            return;
        }
    };

    for entry in entries {
        if state.cancel.is_cancelled() {
            return;
        }
        let path = entry.path().to_path_buf();
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            handle_symlink(&path, item.depth, tx, state, sink);
        } else if file_type.is_dir() {
            enqueue_subdirectory(path, item.depth, tx, state);
        } else if file_type.is_file() {
            consider_file(&path, state, sink);
        }
    }
}

fn handle_symlink<F>(
    path: &Path,
    depth: u32,
    tx: &crossbeam_channel::Sender<WorkItem>,
    state: &Arc<SharedState>,
    sink: &Arc<F>,
) where
    F: Fn(FileEntry) + Send + Sync + 'static,
{
    if !state.options.follow_symlinks {
        state.stats.symlinks_skipped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let target = match std::fs::canonicalize(path) {
        Ok(target) => target,
        Err(source) => {
            let scan_err = if source.kind() == std::io::ErrorKind::PermissionDenied {
                ScanError::AccessDenied { path: path.to_path_buf() }
            } else {
                ScanError::Metadata { path: path.to_path_buf(), source }
            };
            state.errors.push(path.to_path_buf(), scan_err);
            return;
        }
    };

    {
        let mut visited = state.visited_symlinks.lock().unwrap();
        if !visited.insert(target.clone()) {
            return;
        }
    }

    if target.is_dir() {
        enqueue_subdirectory(path.to_path_buf(), depth, tx, state);
    } else if target.is_file() {
        consider_file(path, state, sink);
    }
}

fn enqueue_subdirectory(path: PathBuf, depth: u32, tx: &crossbeam_channel::Sender<WorkItem>, state: &Arc<SharedState>) {
    let max_depth = state.options.max_depth;
    if max_depth != 0 && depth + 1 > max_depth {
        return;
    }

    let canonical = canonical_or(&path);
    {
        let mut visited = state.visited_dirs.lock().unwrap();
        if !visited.insert(canonical) {
            return;
        }
    }

    state.pending.fetch_add(1, Ordering::SeqCst);
    if tx.send(WorkItem { path, depth: depth + 1 }).is_err() {
        state.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

fn consider_file<F>(path: &Path, state: &Arc<SharedState>, sink: &Arc<F>)
where
    F: Fn(FileEntry) + Send + Sync + 'static,
{
    state.stats.files_seen.fetch_add(1, Ordering::Relaxed);

    if state.ignore.is_ignored(&state.root, path) {
        state.stats.files_ignored.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(source) => {
            let scan_err = if source.kind() == std::io::ErrorKind::PermissionDenied {
                ScanError::AccessDenied { path: path.to_path_buf() }
            } else {
                ScanError::Metadata { path: path.to_path_buf(), source }
            };
            state.errors.push(path.to_path_buf(), scan_err);
            return;
        }
    };

    let size = metadata.len();
    if let Some(min) = state.options.min_size {
        if size < min {
            state.stats.files_ignored.fetch_add(1, Ordering::Relaxed);
            return;
        }
    }
    if let Some(max) = state.options.max_size {
        if size > max {
            state.stats.files_ignored.fetch_add(1, Ordering::Relaxed);
            return;
        }
    }

    let modified = metadata.modified().ok();
    if let (Some(max_age), Some(modified)) = (state.options.max_age, modified) {
        if let Ok(age) = modified.elapsed() {
            if age > max_age {
                state.stats.files_ignored.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }

    state.stats.bytes_seen.fetch_add(size, Ordering::Relaxed);
    state.stats.files_emitted.fetch_add(1, Ordering::Relaxed);
    sink(FileEntry { path: path.to_path_buf(), size, modified });
}

fn canonical_or(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
