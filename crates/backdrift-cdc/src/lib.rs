/*!
 * Content-Defined Chunking (CDC) engine.
 *
 * Provides a deterministic, seedable Gear hash, a FastCDC-style normalized
 * cut-point finder, and a [`Chunker`] that drives both over in-memory
 * buffers or whole files, sequentially or in parallel.
 */

mod cancel;
mod chunker;
mod cutpoint;
mod digest;
mod error;
mod gear;
mod prng;

pub use cancel::CancellationToken;
pub use chunker::{
    Chunker, ChunkerConfig, ChunkInfo, ChunkOutcome, DEFAULT_PARALLEL_BLOCK_SIZE,
    DEFAULT_PARALLEL_THRESHOLD,
};
pub use cutpoint::{find_cut_point, mask_for_avg_size};
pub use digest::{content_digest, to_hex, HashKind};
pub use error::{CdcError, Result};
pub use gear::{GearTable, HashState, GEAR_MASK, STANDARD_SEED};
pub use prng::DeterministicPrng;
