/*!
 * Top-level error type, composing the sub-crate error enums the way
 * `orbit::error::OrbitError` composes protocol- and compression-specific
 * failures into one process-wide enum.
 */

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackdriftError>;

#[derive(Error, Debug)]
pub enum BackdriftError {
    #[error("chunking failed: {0}")]
    Cdc(#[from] backdrift_cdc::CdcError),

    #[error("scheduling failed: {0}")]
    Scheduler(#[from] backdrift_sched::SchedulerError),

    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the directory walker and ignore-rule engine.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid glob pattern {pattern:?}: {source}")]
    InvalidGlob { pattern: String, source: glob::PatternError },

    #[error("failed to read directory {path}: {source}")]
    ReadDir { path: PathBuf, source: std::io::Error },

    #[error("failed to read metadata for {path}: {source}")]
    Metadata { path: PathBuf, source: std::io::Error },

    #[error("permission denied: {path}")]
    AccessDenied { path: PathBuf },

    #[error("root path does not exist: {0}")]
    RootNotFound(PathBuf),
}
