/*!
 * Error types for the chunking engine
 */

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CdcError>;

#[derive(Error, Debug)]
pub enum CdcError {
    #[error("invalid chunker configuration: {0}")]
    InvalidConfig(String),

    #[error("PRNG seed too short: need at least {minimum} bytes, got {actual}")]
    SeedTooShort { actual: usize, minimum: usize },

    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("permission denied: {path}")]
    AccessDenied { path: PathBuf },

    #[error("read error at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
