/*!
 * The Chunker: drives the cut-point finder over a buffer or file, emitting
 * `ChunkInfo` records.
 *
 * The sequential file path is grounded on `orbit_core_cdc::ChunkStream`'s
 * overlap-copy buffer management (`Vec::copy_within` to slide unconsumed
 * tail bytes to the front before refilling). The parallel file path is
 * grounded on `orbit::core::directory`'s use of a dedicated `rayon`
 * thread pool to fan work out across a bounded set of workers.
 */

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::cancel::CancellationToken;
use crate::cutpoint::find_cut_point;
use crate::digest::{content_digest, to_hex, HashKind};
use crate::error::{CdcError, Result};
use crate::gear::GearTable;

/// Default size of each independently-chunked block in parallel mode.
pub const DEFAULT_PARALLEL_BLOCK_SIZE: u64 = 128 * 1024 * 1024;

/// Files at or above this size are the intended audience for `parallel=true`;
/// smaller files may still be chunked in parallel if asked, but the seam
/// non-determinism documented on [`Chunker::chunk_file`] applies regardless
/// of this threshold. It exists purely as caller guidance.
pub const DEFAULT_PARALLEL_THRESHOLD: u64 = 100 * 1024 * 1024;

/// An immutable record of one content-defined chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    pub offset: u64,
    pub length: u32,
    pub digest: Vec<u8>,
}

impl ChunkInfo {
    /// Lowercase hex encoding of `digest`, with no separators.
    pub fn digest_hex(&self) -> String {
        to_hex(&self.digest)
    }
}

/// Result of chunking a whole file: chunks plus whether the call was cut
/// short by cancellation.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutcome {
    pub chunks: Vec<ChunkInfo>,
    pub cancelled: bool,
}

/// Validated `(minSize, avgSize, maxSize, hashKind)` tuple.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub min_size: u32,
    pub avg_size: u32,
    pub max_size: u32,
    pub hash_kind: HashKind,
}

impl ChunkerConfig {
    pub fn new(min_size: u32, avg_size: u32, max_size: u32, hash_kind: HashKind) -> Result<Self> {
        if min_size == 0 {
            return Err(CdcError::InvalidConfig(
                "min_size must be greater than zero".to_string(),
            ));
        }
        if min_size >= avg_size {
            return Err(CdcError::InvalidConfig(
                "min_size must be less than avg_size".to_string(),
            ));
        }
        if avg_size >= max_size {
            return Err(CdcError::InvalidConfig(
                "avg_size must be less than max_size".to_string(),
            ));
        }
        Ok(Self {
            min_size,
            avg_size,
            max_size,
            hash_kind,
        })
    }

    /// 8 KiB min / 64 KiB avg / 256 KiB max, SHA-256.
    pub fn default_config() -> Self {
        Self {
            min_size: 8 * 1024,
            avg_size: 64 * 1024,
            max_size: 256 * 1024,
            hash_kind: HashKind::Sha256,
        }
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Drives the cut-point finder over a buffer or file.
///
/// Owns its [`GearTable`] for the chunker's lifetime; the table MUST NOT vary
/// across files chunked by the same instance.
pub struct Chunker {
    config: ChunkerConfig,
    table: GearTable,
    parallel_block_size: u64,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self::with_table(config, GearTable::standard())
    }

    pub fn with_table(config: ChunkerConfig, table: GearTable) -> Self {
        Self {
            config,
            table,
            parallel_block_size: DEFAULT_PARALLEL_BLOCK_SIZE,
        }
    }

    pub fn with_parallel_block_size(mut self, block_size: u64) -> Self {
        self.parallel_block_size = block_size;
        self
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk `buf[start..start+len]` in memory. Pure and synchronous - no
    /// cancellation token, since it never blocks on I/O.
    pub fn chunk_buffer(&self, buf: &[u8], start: usize, len: usize) -> Vec<ChunkInfo> {
        let end_all = start + len;
        let mut chunks = Vec::new();
        let mut pos = start;

        while pos < end_all {
            let window_end = (pos + self.config.max_size as usize).min(end_all);
            let cut = find_cut_point(
                &self.table,
                buf,
                pos,
                window_end,
                self.config.min_size as usize,
                self.config.avg_size as usize,
                self.config.max_size as usize,
            );
            let digest = content_digest(self.config.hash_kind, &buf[pos..cut]);
            trace!(offset = pos, length = cut - pos, "emitted chunk");
            chunks.push(ChunkInfo {
                offset: pos as u64,
                length: (cut - pos) as u32,
                digest,
            });
            pos = cut;
        }

        chunks
    }

    /// Chunk a file, sequentially or in parallel.
    ///
    /// Sequential mode is bit-for-bit deterministic across hosts for
    /// identical `(bytes, config, hash_kind)`. Parallel mode partitions the
    /// file into fixed-size blocks and chunks each independently; cut points
    /// at block seams are not guaranteed to match the sequential result.
    pub fn chunk_file(
        &self,
        path: &Path,
        parallel: bool,
        cancel: &CancellationToken,
    ) -> Result<ChunkOutcome> {
        if parallel {
            self.chunk_file_parallel(path, cancel)
        } else {
            self.chunk_file_sequential(path, cancel)
        }
    }

    fn chunk_file_sequential(&self, path: &Path, cancel: &CancellationToken) -> Result<ChunkOutcome> {
        let mut file = open_or_not_found(path)?;
        let max_size = self.config.max_size as usize;
        let mut buffer = vec![0u8; max_size * 2];
        let mut buf_len = 0usize;
        let mut buf_pos = 0usize;
        let mut stream_offset: u64 = 0;
        let mut finished = false;
        let mut chunks = Vec::new();

        loop {
            if cancel.is_cancelled() {
                debug!(path = %path.display(), "chunk_file cancelled");
                return Ok(ChunkOutcome { chunks, cancelled: true });
            }

            if buf_len - buf_pos < max_size && !finished {
                finished = refill(&mut file, &mut buffer, &mut buf_len, &mut buf_pos, stream_offset)?;
            }

            if buf_pos >= buf_len {
                break;
            }

            let available = buf_len - buf_pos;
            let window_end = buf_pos + available.min(max_size);
            let cut = find_cut_point(
                &self.table,
                &buffer,
                buf_pos,
                window_end,
                self.config.min_size as usize,
                self.config.avg_size as usize,
                self.config.max_size as usize,
            );

            let chunk_len = cut - buf_pos;
            if chunk_len == 0 {
                break;
            }

            let digest = content_digest(self.config.hash_kind, &buffer[buf_pos..cut]);
            chunks.push(ChunkInfo {
                offset: stream_offset,
                length: chunk_len as u32,
                digest,
            });

            stream_offset += chunk_len as u64;
            buf_pos = cut;
        }

        Ok(ChunkOutcome { chunks, cancelled: false })
    }

    fn chunk_file_parallel(&self, path: &Path, cancel: &CancellationToken) -> Result<ChunkOutcome> {
        let metadata = std::fs::metadata(path).map_err(|source| match source.kind() {
            io::ErrorKind::PermissionDenied => CdcError::AccessDenied { path: path.to_path_buf() },
            _ => CdcError::NotFound { path: path.to_path_buf() },
        })?;
        let file_len = metadata.len();

        if file_len == 0 {
            return Ok(ChunkOutcome::default());
        }

        let block_size = self.parallel_block_size.max(self.config.max_size as u64);
        let mut blocks = Vec::new();
        let mut offset = 0u64;
        while offset < file_len {
            let len = block_size.min(file_len - offset);
            blocks.push((offset, len));
            offset += len;
        }

        debug!(path = %path.display(), blocks = blocks.len(), "chunking file in parallel");

        let results: Vec<Result<(u64, Vec<ChunkInfo>)>> = blocks
            .par_iter()
            .map(|&(block_offset, block_len)| -> Result<(u64, Vec<ChunkInfo>)> {
                if cancel.is_cancelled() {
                    return Ok((block_offset, Vec::new()));
                }

                let mut file = open_or_not_found(path)?;
                file.seek(SeekFrom::Start(block_offset))
                    .map_err(|source| CdcError::Read { offset: block_offset, source })?;

                let mut buf = vec![0u8; block_len as usize];
                file.read_exact(&mut buf)
                    .map_err(|source| CdcError::Read { offset: block_offset, source })?;

                let mut chunks = self.chunk_buffer(&buf, 0, buf.len());
                for chunk in &mut chunks {
                    chunk.offset += block_offset;
                }
                Ok((block_offset, chunks))
            })
            .collect();

        let mut ordered: Vec<(u64, Vec<ChunkInfo>)> = Vec::with_capacity(results.len());
        for result in results {
            ordered.push(result?);
        }
        ordered.sort_by_key(|(offset, _)| *offset);

        let chunks = ordered.into_iter().flat_map(|(_, c)| c).collect();
        Ok(ChunkOutcome { chunks, cancelled: cancel.is_cancelled() })
    }
}

fn open_or_not_found(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => CdcError::NotFound { path: path.to_path_buf() },
        io::ErrorKind::PermissionDenied => CdcError::AccessDenied { path: path.to_path_buf() },
        _ => CdcError::Io(source),
    })
}

/// Slide unconsumed tail bytes to the front of `buffer`, then refill the
/// remainder from `file`. Returns whether EOF was reached.
fn refill(
    file: &mut File,
    buffer: &mut [u8],
    buf_len: &mut usize,
    buf_pos: &mut usize,
    stream_offset: u64,
) -> Result<bool> {
    if *buf_pos > 0 && *buf_len > *buf_pos {
        let remaining = *buf_len - *buf_pos;
        buffer.copy_within(*buf_pos..*buf_len, 0);
        *buf_len = remaining;
        *buf_pos = 0;
    } else if *buf_pos >= *buf_len {
        *buf_len = 0;
        *buf_pos = 0;
    }

    loop {
        if *buf_len >= buffer.len() {
            return Ok(false);
        }
        match file.read(&mut buffer[*buf_len..]) {
            Ok(0) => return Ok(true),
            Ok(n) => *buf_len += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                warn!(offset = stream_offset, error = %source, "read error while chunking");
                return Err(CdcError::Read { offset: stream_offset, source });
            }
        }
    }
}
